//! OX question loader.

use super::find_subject;
use crate::error::ExamError;
use crate::output::{LoadSummary, OxQuestion};
use crate::parse::read_json;
use sqlx::postgres::PgPool;
use std::path::{Path, PathBuf};
use tracing::info;

const OX_FILE_SUFFIX: &str = "_ox_questions.json";

#[derive(Debug, Clone)]
pub struct OxLoadRequest {
    /// Must already exist in `subjects`.
    pub subject: String,
    pub file: PathBuf,
    pub created_by_user: String,
    pub created_by_ip: String,
}

/// One `ox_questions` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OxRow {
    pub number: String,
    pub question_text: String,
    pub answer: bool,
    pub explanation: String,
    pub tags: Vec<String>,
}

/// Subject name encoded in an OX file name:
/// `행정소송법_ox_questions.json` → `행정소송법`.
pub fn subject_from_ox_file(path: &Path) -> Option<String> {
    path.file_name()?
        .to_str()?
        .strip_suffix(OX_FILE_SUFFIX)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn prepare_ox(q: &OxQuestion) -> OxRow {
    OxRow {
        number: q.number.clone(),
        question_text: q.question.clone(),
        answer: q.answer.trim().eq_ignore_ascii_case("O"),
        explanation: q.explanation.clone(),
        tags: q
            .category
            .split('/')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

/// Insert every question of an OX JSON file for an existing subject.
pub async fn load_ox(pool: &PgPool, req: &OxLoadRequest) -> Result<LoadSummary, ExamError> {
    let questions: Vec<OxQuestion> = read_json(&req.file)?;

    let mut tx = pool.begin().await?;
    let subject_id = find_subject(&mut tx, &req.subject)
        .await?
        .ok_or_else(|| ExamError::UnknownSubject(req.subject.clone()))?;

    for q in &questions {
        let row = prepare_ox(q);
        sqlx::query(
            r#"
            INSERT INTO ox_questions (
                subject_id, number, question_text, answer,
                explanation, tag,
                created_by_ip, created_by_user_id,
                updated_by_ip, updated_by_user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $7, $8)
            "#,
        )
        .bind(subject_id)
        .bind(&row.number)
        .bind(&row.question_text)
        .bind(row.answer)
        .bind(&row.explanation)
        .bind(&row.tags)
        .bind(&req.created_by_ip)
        .bind(&req.created_by_user)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(
        "Loaded {} OX questions for '{}' (subject id {})",
        questions.len(),
        req.subject,
        subject_id
    );
    Ok(LoadSummary {
        subject_id,
        ox_questions: questions.len(),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ox(answer: &str, category: &str) -> OxQuestion {
        OxQuestion {
            number: "4".into(),
            question: "조세법률주의는 헌법상 명시된 원칙이다.".into(),
            answer: answer.into(),
            category: category.into(),
            explanation: "헌법 제59조".into(),
        }
    }

    #[test]
    fn answer_o_is_true_anything_else_false() {
        assert!(prepare_ox(&ox("O", "")).answer);
        assert!(prepare_ox(&ox(" o ", "")).answer);
        assert!(!prepare_ox(&ox("X", "")).answer);
        assert!(!prepare_ox(&ox("", "")).answer);
    }

    #[test]
    fn category_becomes_trimmed_tags() {
        let row = prepare_ox(&ox("O", " 조세법의 기본원칙 / 헌법상 조세원칙 /"));
        assert_eq!(row.tags, vec!["조세법의 기본원칙", "헌법상 조세원칙"]);
        assert!(prepare_ox(&ox("O", "")).tags.is_empty());
    }

    #[test]
    fn transcribed_ox_shape_is_accepted() {
        let q: OxQuestion = serde_json::from_str(
            r#"{"number": 12, "question": "q", "answer": "X", "theme": "소송요건"}"#,
        )
        .unwrap();
        let row = prepare_ox(&q);
        assert_eq!(row.number, "12");
        assert_eq!(row.tags, vec!["소송요건"]);
        assert_eq!(row.explanation, "");
    }

    #[test]
    fn subject_comes_from_file_name() {
        assert_eq!(
            subject_from_ox_file(Path::new("data/output/행정소송법_ox_questions.json")).as_deref(),
            Some("행정소송법")
        );
        assert_eq!(subject_from_ox_file(Path::new("_ox_questions.json")), None);
        assert_eq!(subject_from_ox_file(Path::new("other.json")), None);
    }
}

//! Exam question loader: subjects → problem_groups → questions → choices / answers.

use super::find_subject;
use crate::error::ExamError;
use crate::output::{AnswerRecord, ExamQuestion, LoadSummary};
use crate::parse::read_json;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::value::RawValue;
use sqlx::postgres::PgPool;
use sqlx::PgConnection;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

static PROBLEM_INFO: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]{4})\.\s*(.*)").unwrap());
static LEADING_CIRCLED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*[①-⑤]\s*").unwrap());

/// What to load and where it belongs.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    /// Subject name; created when missing.
    pub subject: String,
    /// Name of the new problem group.
    pub problem_group: String,
    /// Stored on every question as a `text[]`.
    pub tags: Vec<String>,
    /// Output of the parse stage.
    pub questions_file: PathBuf,
    pub answers_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceKind {
    Text,
    Table,
}

impl ChoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChoiceKind::Text => "text",
            ChoiceKind::Table => "table",
        }
    }
}

/// One `choices` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceRow {
    /// 1-based for text choices, `None` for table rows.
    pub index: Option<i32>,
    pub kind: ChoiceKind,
    pub content: String,
}

/// One `questions` row plus its choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRow {
    pub number: String,
    pub exam_year: Option<i32>,
    pub exam_name: Option<String>,
    pub description: String,
    pub choices: Vec<ChoiceRow>,
}

/// One `answers` row, keyed by question number until the id is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRow {
    pub number: String,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

/// `"2020. 세무사"` → `(Some(2020), Some("세무사"))`. Anything else → `(None, None)`.
pub fn parse_problem_info(info: &str) -> (Option<i32>, Option<String>) {
    match PROBLEM_INFO.captures(info) {
        Some(caps) => (caps[1].parse().ok(), Some(caps[2].trim().to_string())),
        None => (None, None),
    }
}

/// Split `"① a ② b"` into `["a", "b"]`.
///
/// The text is cut before every circled digit ①–⑤. Blank pieces are
/// dropped before the leading digit is removed, so a bare `①` yields an
/// empty choice. Text before the first digit is kept as its own choice.
pub fn split_text_choices(raw: &str) -> Vec<String> {
    let raw = raw.trim();
    let mut cuts: Vec<usize> = raw
        .char_indices()
        .filter(|(_, c)| ('①'..='⑤').contains(c))
        .map(|(i, _)| i)
        .collect();
    cuts.insert(0, 0);
    cuts.push(raw.len());
    cuts.dedup();

    cuts.windows(2)
        .map(|w| raw[w[0]..w[1]].trim())
        .filter(|piece| !piece.is_empty())
        .map(|piece| LEADING_CIRCLED.replace(piece, "").trim().to_string())
        .collect()
}

#[derive(Deserialize)]
struct TableChoices<'a> {
    #[serde(borrow)]
    choices: Vec<&'a RawValue>,
}

/// Options of a table-type choice: a JSON object whose `choices` is a
/// non-empty array. Each option is returned as its JSON text.
pub fn table_choices(raw: &str) -> Option<Vec<String>> {
    if !raw.trim_start().starts_with('{') {
        return None;
    }
    let table: TableChoices = serde_json::from_str(raw).ok()?;
    if table.choices.is_empty() {
        return None;
    }
    Some(table.choices.iter().map(|v| v.get().to_string()).collect())
}

pub fn prepare_choices(raw: &str) -> Vec<ChoiceRow> {
    if let Some(options) = table_choices(raw) {
        return options
            .into_iter()
            .map(|content| ChoiceRow {
                index: None,
                kind: ChoiceKind::Table,
                content,
            })
            .collect();
    }
    split_text_choices(raw)
        .into_iter()
        .zip(1..)
        .map(|(content, index)| ChoiceRow {
            index: Some(index),
            kind: ChoiceKind::Text,
            content,
        })
        .collect()
}

pub fn prepare_question(q: &ExamQuestion) -> QuestionRow {
    let (exam_year, exam_name) = q
        .problem_info
        .as_deref()
        .map(parse_problem_info)
        .unwrap_or((None, None));
    QuestionRow {
        number: q.problem_num.clone(),
        exam_year,
        exam_name,
        description: q.description.clone(),
        choices: prepare_choices(&q.choice),
    }
}

/// `None` when the answer is missing or blank.
pub fn prepare_answer(a: &AnswerRecord) -> Option<AnswerRow> {
    let correct = a.answer.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    Some(AnswerRow {
        number: a.number.trim().to_string(),
        correct_answer: correct.to_string(),
        explanation: a.explanation.clone(),
    })
}

async fn find_or_create_subject(conn: &mut PgConnection, name: &str) -> Result<i32, sqlx::Error> {
    if let Some(id) = find_subject(&mut *conn, name).await? {
        debug!("Subject '{}' exists (id {})", name, id);
        return Ok(id);
    }
    let (id,): (i32,) = sqlx::query_as("INSERT INTO subjects (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    info!("Created subject '{}' (id {})", name, id);
    Ok(id)
}

async fn insert_question(
    conn: &mut PgConnection,
    group_id: i32,
    tags: &[String],
    row: &QuestionRow,
) -> Result<i32, sqlx::Error> {
    let (question_id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO questions (problem_group_id, number, exam_year, exam_name, description, tag)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(group_id)
    .bind(&row.number)
    .bind(row.exam_year)
    .bind(&row.exam_name)
    .bind(&row.description)
    .bind(tags)
    .fetch_one(&mut *conn)
    .await?;

    for choice in &row.choices {
        sqlx::query(
            "INSERT INTO choices (question_id, choice_index, choice_type, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(question_id)
        .bind(choice.index)
        .bind(choice.kind.as_str())
        .bind(&choice.content)
        .execute(&mut *conn)
        .await?;
    }
    Ok(question_id)
}

/// Load a parsed question file (and optional answer file) as a new
/// problem group.
pub async fn load_exam(pool: &PgPool, req: &LoadRequest) -> Result<LoadSummary, ExamError> {
    let questions: Vec<ExamQuestion> = read_json(&req.questions_file)?;
    let answers: Vec<AnswerRecord> = match &req.answers_file {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    let mut summary = LoadSummary::default();
    let mut tx = pool.begin().await?;

    summary.subject_id = find_or_create_subject(&mut tx, &req.subject).await?;
    let (group_id,): (i32,) =
        sqlx::query_as("INSERT INTO problem_groups (subjects_id, name) VALUES ($1, $2) RETURNING id")
            .bind(summary.subject_id)
            .bind(&req.problem_group)
            .fetch_one(&mut *tx)
            .await?;
    summary.problem_group_id = Some(group_id);

    for q in &questions {
        let row = prepare_question(q);
        insert_question(&mut tx, group_id, &req.tags, &row).await?;
        summary.questions += 1;
        summary.choices += row.choices.len();
    }

    let question_ids: HashMap<String, i32> =
        sqlx::query_as::<_, (i32, String)>("SELECT id, number FROM questions WHERE problem_group_id = $1")
            .bind(group_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|(id, number)| (number, id))
            .collect();

    for a in &answers {
        let Some(row) = prepare_answer(a) else {
            warn!("Answer {} has no correct answer, skipped", a.number);
            summary.answers_skipped += 1;
            continue;
        };
        let Some(&question_id) = question_ids.get(&row.number) else {
            warn!("Answer {} has no matching question, skipped", row.number);
            summary.answers_skipped += 1;
            continue;
        };
        sqlx::query("INSERT INTO answers (question_id, correct_answer, explanation) VALUES ($1, $2, $3)")
            .bind(question_id)
            .bind(&row.correct_answer)
            .bind(&row.explanation)
            .execute(&mut *tx)
            .await?;
        summary.answers += 1;
    }

    tx.commit().await?;
    info!(
        "Loaded '{}' / '{}': {} questions, {} choices, {} answers ({} skipped)",
        req.subject,
        req.problem_group,
        summary.questions,
        summary.choices,
        summary.answers,
        summary.answers_skipped
    );
    Ok(summary)
}

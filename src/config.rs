//! Configuration types for every pipeline stage.
//!
//! Each stage has one config struct built through a builder, so callers set
//! only what they care about and rely on documented defaults for the rest.
//! Setters clamp obviously out-of-range values; `build()` rejects
//! combinations that cannot work.

use crate::error::ExamError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default rendering DPI for both crop variants.
pub const DEFAULT_DPI: u32 = 300;

/// Default model used for transcription.
pub const DEFAULT_MODEL: &str = "gpt-4o";

// ── Geometry-ish config ──────────────────────────────────────────────────

/// A rectangle in PDF points with a top-left origin (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ClipRect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn is_valid(&self) -> bool {
        self.x0 >= 0.0 && self.y0 >= 0.0 && self.width() > 0.0 && self.height() > 0.0
    }
}

impl Default for ClipRect {
    /// The left margin strip where question numbers are printed.
    fn default() -> Self {
        Self::new(0.0, 50.0, 300.0, 700.0)
    }
}

impl std::str::FromStr for ClipRect {
    type Err = ExamError;

    /// Parse `"x0,y0,x1,y1"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|e| ExamError::InvalidConfig(format!("clip '{s}': {e}")))?;
        match parts.as_slice() {
            [x0, y0, x1, y1] => Ok(Self::new(*x0, *y0, *x1, *y1)),
            _ => Err(ExamError::InvalidConfig(format!(
                "clip '{s}' must have four comma-separated values"
            ))),
        }
    }
}

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// All pages (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into a sorted, deduplicated list of 0-indexed page numbers.
    pub fn to_indices(&self, total_pages: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = match self {
            PageSelection::All => (0..total_pages).collect(),
            PageSelection::Single(p) => {
                if *p >= 1 && *p <= total_pages {
                    vec![p - 1]
                } else {
                    vec![]
                }
            }
            PageSelection::Range(start, end) => {
                let s = (*start).max(1) - 1;
                let e = (*end).min(total_pages);
                (s..e).collect()
            }
            PageSelection::Set(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= total_pages)
                .map(|p| p - 1)
                .collect(),
        };
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl std::str::FromStr for PageSelection {
    type Err = ExamError;

    /// Parse `all`, `5`, `3-15` or `1,3,5,7`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let bad = |what: &str| ExamError::InvalidConfig(format!("pages '{s}': {what}"));
        let page = |p: &str| -> Result<usize, ExamError> {
            let n: usize = p.trim().parse().map_err(|_| bad("not a number"))?;
            if n < 1 {
                return Err(bad("pages are 1-indexed"));
            }
            Ok(n)
        };

        if s == "all" {
            return Ok(PageSelection::All);
        }
        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (page(start)?, page(end)?);
            if start > end {
                return Err(bad("start must be <= end"));
            }
            return Ok(PageSelection::Range(start, end));
        }
        if s.contains(',') {
            let pages = s.split(',').map(page).collect::<Result<Vec<_>, _>>()?;
            return Ok(PageSelection::Set(pages));
        }
        Ok(PageSelection::Single(page(&s)?))
    }
}

// ── OCR engine ───────────────────────────────────────────────────────────

/// Parameters passed to the tesseract CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Binary to run. Default: `tesseract` on PATH.
    pub binary_path: Option<String>,
    /// Page segmentation mode. Default: 6 (single uniform block).
    pub psm: u8,
    /// OCR engine mode. Default: 3 (whatever is available).
    pub oem: u8,
    /// Restrict recognition to these characters. Default: ASCII digits.
    pub char_whitelist: Option<String>,
    /// Override for `TESSDATA_PREFIX`.
    pub tessdata_path: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            psm: 6,
            oem: 3,
            char_whitelist: Some("0123456789".to_string()),
            tessdata_path: None,
        }
    }
}

impl TesseractConfig {
    pub fn binary(&self) -> &str {
        self.binary_path.as_deref().unwrap_or("tesseract")
    }
}

// ── Crop by OCR ──────────────────────────────────────────────────────────

/// Configuration for cropping image-only PDFs using OCR-detected numbers.
#[derive(Debug, Clone)]
pub struct OcrCropConfig {
    /// Rendering DPI. Range: 72–600. Default: 300.
    pub dpi: u32,
    /// Pages to crop. Default: all.
    pub pages: PageSelection,
    /// Region scanned for question numbers, in points. Default: `0,50,300,700`.
    pub clip: ClipRect,
    /// Clip used for the first selected page only (chapter openers often
    /// carry a taller header).
    pub first_page_clip: Option<ClipRect>,
    /// Pixels kept above each detected number. Default: 20.
    pub top_margin_px: u32,
    /// OCR engine parameters.
    pub tesseract: TesseractConfig,
    /// PDF user password.
    pub password: Option<String>,
    /// Where crops are written. Default: the PDF path without `.pdf`.
    pub output_dir: Option<PathBuf>,
    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for OcrCropConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            pages: PageSelection::All,
            clip: ClipRect::default(),
            first_page_clip: None,
            top_margin_px: 20,
            tesseract: TesseractConfig::default(),
            password: None,
            output_dir: None,
            download_timeout_secs: 120,
        }
    }
}

impl OcrCropConfig {
    pub fn builder() -> OcrCropConfigBuilder {
        OcrCropConfigBuilder {
            config: Self::default(),
        }
    }

    /// The clip rectangle to use for the `position`-th selected page.
    pub fn clip_for(&self, position: usize) -> ClipRect {
        match (position, self.first_page_clip) {
            (0, Some(first)) => first,
            _ => self.clip,
        }
    }
}

/// Builder for [`OcrCropConfig`].
#[derive(Debug)]
pub struct OcrCropConfigBuilder {
    config: OcrCropConfig,
}

impl OcrCropConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn clip(mut self, clip: ClipRect) -> Self {
        self.config.clip = clip;
        self
    }

    pub fn first_page_clip(mut self, clip: ClipRect) -> Self {
        self.config.first_page_clip = Some(clip);
        self
    }

    pub fn top_margin_px(mut self, px: u32) -> Self {
        self.config.top_margin_px = px;
        self
    }

    pub fn tesseract(mut self, tesseract: TesseractConfig) -> Self {
        self.config.tesseract = tesseract;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<OcrCropConfig, ExamError> {
        let c = &self.config;
        if !c.clip.is_valid() {
            return Err(ExamError::InvalidConfig(format!(
                "clip rectangle must be non-empty, got {:?}",
                c.clip
            )));
        }
        if let Some(first) = c.first_page_clip {
            if !first.is_valid() {
                return Err(ExamError::InvalidConfig(format!(
                    "first-page clip rectangle must be non-empty, got {first:?}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Crop by text ─────────────────────────────────────────────────────────

/// Configuration for cropping text-extractable PDFs.
#[derive(Debug, Clone)]
pub struct TextCropConfig {
    /// Rendering DPI. Range: 72–600. Default: 300.
    pub dpi: u32,
    /// Pages to scan and crop. Default: all.
    pub pages: PageSelection,
    /// Allowed distance (points) from the mean anchor x. Default: 15.
    pub x_tolerance_pt: f32,
    pub password: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub download_timeout_secs: u64,
}

impl Default for TextCropConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            pages: PageSelection::All,
            x_tolerance_pt: 15.0,
            password: None,
            output_dir: None,
            download_timeout_secs: 120,
        }
    }
}

impl TextCropConfig {
    pub fn builder() -> TextCropConfigBuilder {
        TextCropConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`TextCropConfig`].
#[derive(Debug)]
pub struct TextCropConfigBuilder {
    config: TextCropConfig,
}

impl TextCropConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn x_tolerance_pt(mut self, tol: f32) -> Self {
        self.config.x_tolerance_pt = tol;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = Some(dir.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn build(self) -> Result<TextCropConfig, ExamError> {
        let tol = self.config.x_tolerance_pt;
        if !tol.is_finite() || tol < 0.0 {
            return Err(ExamError::InvalidConfig(format!(
                "x tolerance must be a non-negative number, got {tol}"
            )));
        }
        Ok(self.config)
    }
}

// ── Transcription ────────────────────────────────────────────────────────

/// What kind of document the images contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranscriptionMode {
    /// Multiple-choice questions → tagged LaTeX appended to `<folder>.tex`.
    #[default]
    Exam,
    /// True/false (OX) pages → one JSON array per image.
    Ox,
}

/// Configuration for the vision-model transcription stage.
#[derive(Clone)]
pub struct TranscribeConfig {
    pub mode: TranscriptionMode,

    /// LLM model identifier. Default: `gpt-4o`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0 (transcription, not writing).
    pub temperature: f32,

    /// Maximum tokens the model may generate per image. Default: 4096.
    pub max_tokens: usize,

    /// Custom system prompt. If None, the mode's built-in prompt is used.
    pub system_prompt: Option<String>,

    /// Number of images (in sorted order) to skip. Default: 0.
    pub skip: usize,

    /// Only transcribe images with these file names.
    pub only: Vec<String>,

    /// Output path for exam mode. Default: `<folder>.tex`.
    pub output: Option<PathBuf>,

    pub progress_callback: Option<ProgressCallback>,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            mode: TranscriptionMode::default(),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            system_prompt: None,
            skip: 0,
            only: Vec::new(),
            output: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for TranscribeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscribeConfig")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("skip", &self.skip)
            .field("only", &self.only)
            .field("output", &self.output)
            .finish()
    }
}

impl TranscribeConfig {
    pub fn builder() -> TranscribeConfigBuilder {
        TranscribeConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`TranscribeConfig`].
#[derive(Debug)]
pub struct TranscribeConfigBuilder {
    config: TranscribeConfig,
}

impl TranscribeConfigBuilder {
    pub fn mode(mut self, mode: TranscriptionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.config.skip = n;
        self
    }

    pub fn only(mut self, names: Vec<String>) -> Self {
        self.config.only = names;
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn build(self) -> Result<TranscribeConfig, ExamError> {
        if self.config.max_tokens == 0 {
            return Err(ExamError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Database ─────────────────────────────────────────────────────────────

/// PostgreSQL connection settings.
///
/// `DATABASE_URL` wins when set; otherwise the URL is assembled from the
/// `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER` and `DB_PASSWORD` parts.
#[derive(Clone, Default)]
pub struct DbConfig {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl DbConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self, ExamError> {
        let var = |k: &str| std::env::var(k).ok().filter(|v| !v.is_empty());
        let port = match var("DB_PORT") {
            Some(p) => Some(
                p.parse::<u16>()
                    .map_err(|e| ExamError::InvalidConfig(format!("DB_PORT '{p}': {e}")))?,
            ),
            None => None,
        };
        Ok(Self {
            url: var("DATABASE_URL"),
            host: var("DB_HOST"),
            port,
            name: var("DB_NAME"),
            user: var("DB_USER"),
            password: var("DB_PASSWORD"),
        })
    }

    /// sqlx connect options. `DATABASE_URL` wins; otherwise the discrete
    /// parts are passed through unencoded, so passwords may hold `@`, `/`
    /// or `#`.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ExamError> {
        if let Some(ref url) = self.url {
            return url
                .parse::<PgConnectOptions>()
                .map_err(|e| ExamError::InvalidConfig(format!("DATABASE_URL: {e}")));
        }
        let name = self.name.as_deref().ok_or_else(|| {
            ExamError::InvalidConfig("set DATABASE_URL or DB_NAME (plus DB_HOST/DB_USER)".into())
        })?;
        let mut options = PgConnectOptions::new()
            .host(self.host.as_deref().unwrap_or("localhost"))
            .port(self.port.unwrap_or(5432))
            .database(name);
        if let Some(user) = self.user.as_deref() {
            options = options.username(user);
        }
        if let Some(password) = self.password.as_deref() {
            options = options.password(password);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_selection_to_indices() {
        assert_eq!(PageSelection::All.to_indices(3), vec![0, 1, 2]);
        assert_eq!(PageSelection::Range(7, 24).to_indices(30).first(), Some(&6));
        assert_eq!(PageSelection::Range(7, 24).to_indices(30).len(), 18);
        assert_eq!(PageSelection::Set(vec![3, 1, 3]).to_indices(5), vec![0, 2]);
        assert!(PageSelection::Single(9).to_indices(4).is_empty());
    }

    #[test]
    fn page_selection_parses_cli_forms() {
        assert!(matches!("all".parse::<PageSelection>(), Ok(PageSelection::All)));
        assert!(matches!("4".parse::<PageSelection>(), Ok(PageSelection::Single(4))));
        assert!(matches!(
            "7-24".parse::<PageSelection>(),
            Ok(PageSelection::Range(7, 24))
        ));
        assert!(matches!(
            "1, 3,5".parse::<PageSelection>(),
            Ok(PageSelection::Set(ref v)) if v == &vec![1, 3, 5]
        ));
        assert!("0".parse::<PageSelection>().is_err());
        assert!("5-2".parse::<PageSelection>().is_err());
        assert!("x".parse::<PageSelection>().is_err());
    }

    #[test]
    fn clip_rect_parses_and_validates() {
        let clip: ClipRect = "0,120,300,700".parse().unwrap();
        assert_eq!(clip, ClipRect::new(0.0, 120.0, 300.0, 700.0));
        assert_eq!(clip.height(), 580.0);
        assert!("0,1,2".parse::<ClipRect>().is_err());

        let err = OcrCropConfig::builder()
            .clip(ClipRect::new(0.0, 700.0, 300.0, 50.0))
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn first_page_clip_applies_only_to_first_position() {
        let config = OcrCropConfig::builder()
            .first_page_clip(ClipRect::new(0.0, 120.0, 300.0, 700.0))
            .build()
            .unwrap();
        assert_eq!(config.clip_for(0).y0, 120.0);
        assert_eq!(config.clip_for(1).y0, 50.0);
    }

    #[test]
    fn builders_clamp_dpi() {
        let c = OcrCropConfig::builder().dpi(10_000).build().unwrap();
        assert_eq!(c.dpi, 600);
        let t = TextCropConfig::builder().dpi(1).build().unwrap();
        assert_eq!(t.dpi, 72);
    }

    #[test]
    fn text_crop_rejects_negative_tolerance() {
        assert!(TextCropConfig::builder().x_tolerance_pt(-1.0).build().is_err());
    }

    #[test]
    fn transcribe_defaults() {
        let c = TranscribeConfig::default();
        assert_eq!(c.model_or_default(), "gpt-4o");
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 4096);
        assert!(TranscribeConfig::builder().max_tokens(0).build().is_err());
    }

    #[test]
    fn db_options_from_parts() {
        let c = DbConfig {
            host: Some("db".into()),
            port: Some(6543),
            name: Some("exams".into()),
            user: Some("admin".into()),
            password: Some("p@ss/w#rd".into()),
            ..Default::default()
        };
        let opts = c.connect_options().unwrap();
        assert_eq!(opts.get_host(), "db");
        assert_eq!(opts.get_port(), 6543);
        assert_eq!(opts.get_database(), Some("exams"));
        assert_eq!(opts.get_username(), "admin");
    }

    #[test]
    fn db_options_prefer_database_url() {
        let c = DbConfig {
            url: Some("postgres://u@x:5433/y".into()),
            name: Some("ignored".into()),
            ..Default::default()
        };
        let opts = c.connect_options().unwrap();
        assert_eq!(opts.get_host(), "x");
        assert_eq!(opts.get_database(), Some("y"));
        assert!(DbConfig::default().connect_options().is_err());
        let bad = DbConfig {
            url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(bad.connect_options(), Err(ExamError::InvalidConfig(_))));
    }

    #[test]
    fn db_debug_redacts_password() {
        let c = DbConfig {
            password: Some("secret".into()),
            ..Default::default()
        };
        assert!(!format!("{c:?}").contains("secret"));
    }
}

//! Evaluation dataset CSV: typed records in, per-row results out

use serde::Serialize;
use std::fs::File;
use std::path::Path;

use crate::error::{Error, Result};

/// Column holding the extracted keywords
pub const KEYWORDS_COLUMN: &str = "keywords";

const QUERY_ID_COLUMNS: &[&str] = &["query_id"];
const QUERY_COLUMNS: &[&str] = &["query"];
const ANSWER_COLUMNS: &[&str] = &["expected_answer", "answer"];
const SOURCE_COLUMNS: &[&str] = &["expected_source", "pdf_filename"];

/// One labeled question
#[derive(Debug, Clone, PartialEq)]
pub struct EvalRecord {
    /// Optional identifier carried through to the output
    pub query_id: Option<String>,
    /// Question text
    pub query: String,
    /// Reference answer, used for keyword extraction
    pub expected_answer: String,
    /// Filename of the document holding the answer
    pub expected_source: String,
    /// Keywords a correct answer must mention (empty until extracted)
    pub keywords: Vec<String>,
}

/// Split a keyword cell on commas or pipes
pub fn parse_keywords(cell: &str) -> Vec<String> {
    cell.split([',', '|'])
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

/// Join keywords into a cell
pub fn format_keywords(keywords: &[String]) -> String {
    keywords.join(", ")
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

/// A dataset file with every original column preserved
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: csv::StringRecord,
    rows: Vec<csv::StringRecord>,
    records: Vec<EvalRecord>,
    keywords_column: Option<usize>,
}

impl Dataset {
    /// Read and validate a dataset file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| Error::Dataset(format!("cannot open {}: {}", path.display(), e)))?;
        Self::from_reader(file)
    }

    /// Parse a dataset from any reader
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();

        let query_col = find_column(&headers, QUERY_COLUMNS)
            .ok_or_else(|| Error::Dataset("missing 'query' column".to_string()))?;
        let source_col = find_column(&headers, SOURCE_COLUMNS)
            .ok_or_else(|| Error::Dataset("missing 'expected_source' column".to_string()))?;
        let answer_col = find_column(&headers, ANSWER_COLUMNS);
        let id_col = find_column(&headers, QUERY_ID_COLUMNS);
        let keywords_column = find_column(&headers, &[KEYWORDS_COLUMN]);

        let mut rows = Vec::new();
        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let cell = |col: Option<usize>| {
                col.and_then(|c| row.get(c))
                    .map(|v| v.trim().to_string())
                    .unwrap_or_default()
            };

            let query = cell(Some(query_col));
            if query.is_empty() {
                return Err(Error::Dataset(format!("row {} has an empty query", line + 1)));
            }
            let query_id = Some(cell(id_col)).filter(|id| !id.is_empty());

            records.push(EvalRecord {
                query_id,
                query,
                expected_answer: cell(answer_col),
                expected_source: cell(Some(source_col)),
                keywords: parse_keywords(&cell(keywords_column)),
            });
            rows.push(row);
        }

        Ok(Self {
            headers,
            rows,
            records,
            keywords_column,
        })
    }

    /// Typed records in file order
    pub fn records(&self) -> &[EvalRecord] {
        &self.records
    }

    /// Consume into typed records
    pub fn into_records(self) -> Vec<EvalRecord> {
        self.records
    }

    /// Whether the file has a keywords column
    pub fn has_keywords_column(&self) -> bool {
        self.keywords_column.is_some()
    }

    /// Replace the keywords of row `index`
    pub fn set_keywords(&mut self, index: usize, keywords: Vec<String>) {
        if let Some(record) = self.records.get_mut(index) {
            record.keywords = keywords;
        }
    }

    /// Write the dataset, adding a keywords column when missing
    pub fn write_to<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);

        let mut headers = self.headers.clone();
        let keywords_col = match self.keywords_column {
            Some(col) => col,
            None => {
                headers.push_field(KEYWORDS_COLUMN);
                headers.len() - 1
            }
        };
        writer.write_record(&headers)?;

        for (row, record) in self.rows.iter().zip(&self.records) {
            let keywords = format_keywords(&record.keywords);
            let fields = (0..headers.len()).map(|col| {
                if col == keywords_col {
                    keywords.as_str()
                } else {
                    row.get(col).unwrap_or("")
                }
            });
            writer.write_record(fields)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Rewrite `path` atomically with the current contents
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        self.write_to(&mut tmp)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Whether a row was evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Query answered and scored
    Ok,
    /// Query failed; excluded from aggregates
    Failed,
}

/// One row of the evaluation output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalOutputRecord {
    pub query_id: String,
    pub query: String,
    pub expected_source: String,
    pub keywords: String,
    pub generated_answer: String,
    pub retrieved_sources: String,
    pub retrieval_hit: Option<bool>,
    pub keyword_match_ratio: Option<f64>,
    pub correct: Option<bool>,
    pub status: RowStatus,
    pub error: String,
}

/// Destination for evaluated rows, written as each row completes
pub trait RowSink {
    /// Persist one row
    fn write_row(&mut self, row: &EvalOutputRecord) -> Result<()>;
}

impl RowSink for Vec<EvalOutputRecord> {
    fn write_row(&mut self, row: &EvalOutputRecord) -> Result<()> {
        self.push(row.clone());
        Ok(())
    }
}

/// CSV output flushed after every row
pub struct CsvSink<W: std::io::Write> {
    writer: csv::Writer<W>,
}

impl CsvSink<File> {
    /// Create (or truncate) an output file
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: std::io::Write> CsvSink<W> {
    /// Wrap any writer
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }
}

impl<W: std::io::Write> RowSink for CsvSink<W> {
    fn write_row(&mut self, row: &EvalOutputRecord) -> Result<()> {
        self.writer.serialize(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGINAL: &str = "query_id,query,answer,pdf_filename,extra\n\
                            q1,What is X?,X is a thing.,x.pdf,keep me\n\
                            q2,What is Y?,Y is other.,y.pdf,\n";

    #[test]
    fn test_parse_keywords_accepts_commas_and_pipes() {
        assert_eq!(parse_keywords("Alpha, beta | gamma,,"), vec!["alpha", "beta", "gamma"]);
        assert!(parse_keywords("  ").is_empty());
    }

    #[test]
    fn test_load_with_aliases() {
        let dataset = Dataset::from_reader(ORIGINAL.as_bytes()).unwrap();
        assert!(!dataset.has_keywords_column());
        let records = dataset.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].query_id.as_deref(), Some("q1"));
        assert_eq!(records[0].expected_answer, "X is a thing.");
        assert_eq!(records[1].expected_source, "y.pdf");
        assert!(records[1].keywords.is_empty());
    }

    #[test]
    fn test_missing_required_column() {
        let err = Dataset::from_reader("query,answer\nq,a\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Dataset(_)));
    }

    #[test]
    fn test_write_adds_keywords_and_keeps_columns() {
        let mut dataset = Dataset::from_reader(ORIGINAL.as_bytes()).unwrap();
        dataset.set_keywords(0, vec!["x".to_string(), "thing".to_string()]);

        let mut out = Vec::new();
        dataset.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("query_id,query,answer,pdf_filename,extra,keywords"));
        assert_eq!(lines.next(), Some("q1,What is X?,X is a thing.,x.pdf,keep me,\"x, thing\""));

        let reloaded = Dataset::from_reader(text.as_bytes()).unwrap();
        assert_eq!(reloaded.records()[0].keywords, vec!["x", "thing"]);
    }

    #[test]
    fn test_csv_sink_writes_header_and_empty_metrics() {
        let mut buf = Vec::new();
        {
            let mut sink = CsvSink::from_writer(&mut buf);
            sink.write_row(&EvalOutputRecord {
                query_id: "q1".to_string(),
                query: "What?".to_string(),
                expected_source: "a.pdf".to_string(),
                keywords: "a, b".to_string(),
                generated_answer: String::new(),
                retrieved_sources: String::new(),
                retrieval_hit: None,
                keyword_match_ratio: None,
                correct: None,
                status: RowStatus::Failed,
                error: "offline".to_string(),
            })
            .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("query_id,query,expected_source,keywords,generated_answer,retrieved_sources,retrieval_hit,keyword_match_ratio,correct,status,error")
        );
        assert_eq!(lines.next(), Some("q1,What?,a.pdf,\"a, b\",,,,,,failed,offline"));
    }
}

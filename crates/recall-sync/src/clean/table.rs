/// Character encoding of the input dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// ISO-8859-1; every byte maps to the code point of the same value.
    #[default]
    Latin1,
    /// UTF-8 with invalid sequences replaced.
    Utf8,
}

impl TextEncoding {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "latin1" | "latin-1" | "iso-8859-1" => Some(Self::Latin1),
            "utf8" | "utf-8" => Some(Self::Utf8),
            _ => None,
        }
    }

    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// One parsed line; `None` marks an empty field.
pub type Row = Vec<Option<String>>;

/// A parsed tab-separated line together with its 1-based line number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub line: usize,
    pub fields: Row,
}

/// Split text into tab-separated records. Empty lines are skipped and a
/// trailing carriage return is dropped. A line of bare tabs is a row of
/// missing values.
pub fn parse_tsv(text: &str) -> Vec<Record> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.is_empty())
        .map(|(idx, line)| Record {
            line: idx + 1,
            fields: line
                .split('\t')
                .map(|field| {
                    if field.is_empty() {
                        None
                    } else {
                        Some(field.to_owned())
                    }
                })
                .collect(),
        })
        .collect()
}

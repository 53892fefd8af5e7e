use std::fmt;
use std::io::{self, Read};

/// Entries are digested in blocks of this size so memory stays bounded
/// regardless of how large a single entry decompresses to.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Digest of one file entry inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDigest {
    /// Entry name as listed by the archive.
    pub name: String,
    /// Lowercase hex MD5 of the entry's decompressed bytes.
    pub digest: String,
}

/// Per-entry digests of an archive, in archive-listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    entries: Vec<EntryDigest>,
}

/// How a [`Fingerprint`] collapses into the single value that gets persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FingerprintScope {
    /// Only the first listed entry counts. Archives whose first entry is
    /// unchanged are treated as unchanged even if later entries differ.
    #[default]
    FirstEntry,
    /// Every entry's name and digest, in order, feed one combined digest.
    AllEntries,
}

impl FingerprintScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "first-entry" | "first" => Some(Self::FirstEntry),
            "all-entries" | "all" => Some(Self::AllEntries),
            _ => None,
        }
    }
}

impl fmt::Display for FingerprintScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FirstEntry => write!(f, "first-entry"),
            Self::AllEntries => write!(f, "all-entries"),
        }
    }
}

impl Fingerprint {
    pub fn new(entries: Vec<EntryDigest>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, entry: EntryDigest) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[EntryDigest] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value to compare against and persist, or `None` when the archive
    /// had no file entries to fingerprint.
    pub fn value(&self, scope: FingerprintScope) -> Option<String> {
        let first = self.entries.first()?;

        match scope {
            FingerprintScope::FirstEntry => Some(first.digest.clone()),
            FingerprintScope::AllEntries => {
                let mut ctx = md5::Context::new();
                for entry in &self.entries {
                    ctx.consume(entry.name.as_bytes());
                    ctx.consume([0u8]);
                    ctx.consume(entry.digest.as_bytes());
                    ctx.consume(b"\n");
                }
                Some(format!("{:x}", ctx.compute()))
            }
        }
    }
}

/// Stream a reader through MD5 in [`BLOCK_SIZE`] blocks and return the
/// lowercase hex digest.
pub fn digest_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut ctx = md5::Context::new();
    let mut block = vec![0u8; BLOCK_SIZE];

    loop {
        let n = match reader.read(&mut block) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        ctx.consume(&block[..n]);
    }

    Ok(format!("{:x}", ctx.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, content: &str) -> EntryDigest {
        EntryDigest {
            name: name.to_owned(),
            digest: digest_reader(&mut content.as_bytes()).unwrap(),
        }
    }

    #[test]
    fn digest_of_known_content() {
        assert_eq!(
            digest_reader(&mut "hello".as_bytes()).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            digest_reader(&mut "".as_bytes()).unwrap(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
    }

    #[test]
    fn digest_spans_multiple_blocks() {
        let big = vec![b'x'; BLOCK_SIZE * 2 + 17];
        let streamed = digest_reader(&mut big.as_slice()).unwrap();
        assert_eq!(streamed, format!("{:x}", md5::compute(&big)));
    }

    #[test]
    fn empty_fingerprint_has_no_value() {
        let fp = Fingerprint::default();
        assert!(fp.value(FingerprintScope::FirstEntry).is_none());
        assert!(fp.value(FingerprintScope::AllEntries).is_none());
    }

    #[test]
    fn first_entry_scope_ignores_later_entries() {
        let a = Fingerprint::new(vec![entry("a.txt", "hello"), entry("b.txt", "one")]);
        let b = Fingerprint::new(vec![entry("a.txt", "hello"), entry("b.txt", "two")]);

        assert_eq!(
            a.value(FingerprintScope::FirstEntry),
            b.value(FingerprintScope::FirstEntry)
        );
        assert_eq!(
            a.value(FingerprintScope::FirstEntry).as_deref(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
    }

    #[test]
    fn all_entries_scope_sees_later_entries() {
        let a = Fingerprint::new(vec![entry("a.txt", "hello"), entry("b.txt", "one")]);
        let b = Fingerprint::new(vec![entry("a.txt", "hello"), entry("b.txt", "two")]);

        assert_ne!(
            a.value(FingerprintScope::AllEntries),
            b.value(FingerprintScope::AllEntries)
        );
    }

    #[test]
    fn all_entries_scope_sees_renames() {
        let a = Fingerprint::new(vec![entry("a.txt", "hello")]);
        let b = Fingerprint::new(vec![entry("renamed.txt", "hello")]);

        assert_ne!(
            a.value(FingerprintScope::AllEntries),
            b.value(FingerprintScope::AllEntries)
        );
    }

    #[test]
    fn scope_parse_and_display() {
        assert_eq!(
            FingerprintScope::parse("all-entries"),
            Some(FingerprintScope::AllEntries)
        );
        assert_eq!(
            FingerprintScope::parse("First"),
            Some(FingerprintScope::FirstEntry)
        );
        assert_eq!(FingerprintScope::parse("bogus"), None);
        assert_eq!(FingerprintScope::AllEntries.to_string(), "all-entries");
    }
}

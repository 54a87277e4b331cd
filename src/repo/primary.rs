// src/repo/primary.rs

//! Parser for yum `primary.xml.gz` metadata
//!
//! Checksums for RPM packages come out of the generated repodata rather
//! than being recomputed from the package bytes. Only the fields the
//! checksum lookup needs are mapped; everything else in the document is
//! ignored.

use crate::error::{Error, Result};
use crate::storage::FileInfo;
use flate2::read::GzDecoder;
use serde::Deserialize;
use std::io::{BufReader, Read};

#[derive(Debug, Deserialize)]
pub struct PrimaryMetadata {
    #[serde(rename = "package", default)]
    pub packages: Vec<PrimaryPackage>,
}

#[derive(Debug, Deserialize)]
pub struct PrimaryPackage {
    pub name: String,
    pub checksum: PackageChecksum,
    pub location: PackageLocation,
}

#[derive(Debug, Deserialize)]
pub struct PackageChecksum {
    #[serde(rename = "@type")]
    pub algorithm: String,
    #[serde(rename = "$text")]
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct PackageLocation {
    #[serde(rename = "@href")]
    pub href: String,
}

/// Decompress and parse a `*-primary.xml.gz` stream.
pub fn parse_primary(reader: impl Read) -> Result<PrimaryMetadata> {
    let decoder = BufReader::new(GzDecoder::new(reader));
    quick_xml::de::from_reader(decoder)
        .map_err(|e| Error::Generator(format!("parse primary metadata: {}", e)))
}

impl PrimaryMetadata {
    /// Checksum for the package whose location basename matches
    /// `filename`, if present.
    pub fn checksum_for(&self, filename: &str) -> Option<&PackageChecksum> {
        self.packages.iter().find_map(|p| {
            let base = p.location.href.rsplit('/').next().unwrap_or(&p.location.href);
            (base == filename).then_some(&p.checksum)
        })
    }
}

/// Newest primary file in a repodata listing. createrepo_c retains old
/// metadata for a grace period, so several generations can coexist.
pub fn find_newest_primary(files: &[FileInfo]) -> Option<&FileInfo> {
    files
        .iter()
        .filter(|f| !f.is_dir && f.name.ends_with("-primary.xml.gz"))
        .max_by_key(|f| f.modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata xmlns="http://linux.duke.edu/metadata/common" packages="2">
  <package type="rpm">
    <name>alpha</name>
    <checksum type="sha256" pkgid="YES">aaaa1111</checksum>
    <location href="Packages/alpha-1.0-1.x86_64.rpm"/>
  </package>
  <package type="rpm">
    <name>beta</name>
    <checksum type="sha256" pkgid="YES">bbbb2222</checksum>
    <location href="Packages/beta-2.0-1.noarch.rpm"/>
  </package>
</metadata>"#;

    fn gzipped(xml: &str) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(xml.as_bytes()).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_parse_and_lookup() {
        let meta = parse_primary(gzipped(SAMPLE).as_slice()).unwrap();
        assert_eq!(meta.packages.len(), 2);

        let cs = meta.checksum_for("beta-2.0-1.noarch.rpm").unwrap();
        assert_eq!(cs.algorithm, "sha256");
        assert_eq!(cs.value, "bbbb2222");
        assert!(meta.checksum_for("gamma-3.rpm").is_none());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = parse_primary(gzipped("not xml at all <<<").as_slice()).unwrap_err();
        assert!(matches!(err, Error::Generator(_)));
    }

    #[test]
    fn test_find_newest_primary() {
        let file = |name: &str, secs: i64| FileInfo {
            name: name.to_string(),
            size: 10,
            is_dir: false,
            is_repo: false,
            modified: Utc.timestamp_opt(secs, 0).unwrap(),
        };
        let files = vec![
            file("0ld-primary.xml.gz", 100),
            file("repomd.xml", 300),
            file("n3w-primary.xml.gz", 200),
            file("f1l-filelists.xml.gz", 250),
        ];
        assert_eq!(
            find_newest_primary(&files).unwrap().name,
            "n3w-primary.xml.gz"
        );
        assert!(find_newest_primary(&[]).is_none());
    }
}

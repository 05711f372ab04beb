use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Uploads run artifacts to `s3://{bucket}/runs/{date}/`, optionally
/// gzip-compressed with a `.gz` suffix on the key.
pub struct ArtifactPublisher {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    gzip: bool,
}

impl ArtifactPublisher {
    pub async fn from_env(bucket: &str, run_date: NaiveDate, gzip: bool) -> Self {
        let config = aws_config::load_from_env().await;
        Self {
            client: aws_sdk_s3::Client::new(&config),
            bucket: bucket.to_string(),
            prefix: run_prefix(run_date),
            gzip,
        }
    }

    #[tracing::instrument(skip(self, paths), fields(bucket = %self.bucket, prefix = %self.prefix, gzip = self.gzip))]
    pub async fn publish(&self, paths: &[PathBuf]) -> Result<usize> {
        let mut upload_count = 0;

        for path in paths {
            let file_contents =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let key = object_key(&self.prefix, path, self.gzip)?;

            let (body, content_type) = if self.gzip {
                (gzip_bytes(&file_contents)?, "application/gzip")
            } else {
                (file_contents, content_type(path))
            };

            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(body))
                .content_type(content_type)
                .send()
                .await
                .with_context(|| format!("Failed to upload s3://{}/{}", self.bucket, key))?;

            info!(key = %key, "Artifact uploaded");
            upload_count += 1;
        }

        info!(upload_count, "S3 upload complete");
        Ok(upload_count)
    }
}

fn run_prefix(run_date: NaiveDate) -> String {
    format!("runs/{}", run_date.format("%Y-%m-%d"))
}

fn object_key(prefix: &str, path: &Path, gzip: bool) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("No usable file name in {}", path.display()))?;
    Ok(if gzip {
        format!("{prefix}/{file_name}.gz")
    } else {
        format!("{prefix}/{file_name}")
    })
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn gzip_bytes(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    #[test]
    fn test_object_key() {
        let date = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let prefix = run_prefix(date);
        let path = Path::new("data/processed/accessibility_comparison.csv");

        assert_eq!(
            object_key(&prefix, path, false).unwrap(),
            "runs/2025-04-02/accessibility_comparison.csv"
        );
        assert_eq!(
            object_key(&prefix, path, true).unwrap(),
            "runs/2025-04-02/accessibility_comparison.csv.gz"
        );
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(Path::new("maps/atot_2017.json")), "application/json");
        assert_eq!(content_type(Path::new("a.csv")), "text/csv");
        assert_eq!(content_type(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn test_gzip_bytes_decodes() {
        let csv = b"from_id,ATOT17_45\n48453001100,10\n";
        let compressed = gzip_bytes(csv).unwrap();

        let mut decoded = Vec::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, csv);
    }
}

//! Markdown archive of generated reports.
//!
//! Each digest's report is written to its own file and linked from a master
//! index that groups runs by date:
//!
//! ```text
//! markdown_output_dir/
//! ├── 2025-05-06_081500.md
//! ├── 2025-05-06_173002.md
//! └── daily_digest.md
//! ```
//!
//! The index uses append semantics so several runs per day accumulate under
//! the same date heading.

use crate::models::Digest;
use chrono::Local;
use itertools::Itertools;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const INDEX_FILE: &str = "daily_digest.md";
const INDEX_HEADING: &str = "# Daily Digest Index";

/// File name of the report for `digest`, e.g. `2025-05-06_081500.md`.
pub fn report_filename(digest: &Digest) -> String {
    digest
        .generated_at
        .with_timezone(&Local)
        .format("%Y-%m-%d_%H%M%S.md")
        .to_string()
}

/// Write the digest's report and update the index.
///
/// # Returns
///
/// The path of the report file.
#[instrument(level = "info", skip_all, fields(%markdown_output_dir))]
pub async fn write_report(
    digest: &Digest,
    markdown_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    fs::create_dir_all(markdown_output_dir).await?;
    let filename = report_filename(digest);
    let path = Path::new(markdown_output_dir).join(&filename);

    fs::write(&path, &digest.report).await?;
    info!(path = %path.display(), "Wrote Markdown report");

    update_index(markdown_output_dir, digest, &filename).await?;
    Ok(path)
}

/// Insert `filename` under its date heading in the index text.
///
/// A missing date heading is added right below the title; an entry already
/// present is left alone.
fn insert_index_entry(content: &str, date: &str, entry: &str) -> String {
    let date_heading = format!("- **{date}**");
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    if let Some(i) = lines.iter().position(|l| l.trim() == date_heading) {
        let mut j = i + 1;
        while j < lines.len() && lines[j].starts_with("    - ") {
            if lines[j].trim() == entry.trim() {
                return content.to_string();
            }
            j += 1;
        }
        lines.insert(j, entry.to_string());
    } else {
        let at = lines
            .iter()
            .position(|l| l.starts_with(INDEX_HEADING))
            .map(|p| p + 1)
            .unwrap_or(lines.len());
        lines.insert(at, String::new());
        lines.insert(at + 1, date_heading);
        lines.insert(at + 2, entry.to_string());
    }

    lines.join("\n") + "\n"
}

/// Update the `daily_digest.md` master index.
///
/// # Structure
///
/// Newest dates come first:
/// ```text
/// # Daily Digest Index
///
/// - **2025-05-06**
///     - [08:15:00 · AI, Rust](./2025-05-06_081500.md)
/// ```
#[instrument(level = "info", skip_all, fields(%markdown_output_dir, file = %filename))]
pub async fn update_index(
    markdown_output_dir: &str,
    digest: &Digest,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let index_path = Path::new(markdown_output_dir).join(INDEX_FILE);
    let content = if index_path.exists() {
        fs::read_to_string(&index_path).await?
    } else {
        format!("{INDEX_HEADING}\n")
    };

    let local = digest.generated_at.with_timezone(&Local);
    let entry = format!(
        "    - [{} · {}](./{filename})",
        local.format("%H:%M:%S"),
        digest.keywords.iter().join(", ")
    );
    let updated = insert_index_entry(&content, &local.format("%Y-%m-%d").to_string(), &entry);

    fs::write(&index_path, updated).await?;
    info!(path = %index_path.display(), "Updated digest index");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Language;
    use chrono::Utc;

    #[test]
    fn test_insert_new_date_goes_below_heading() {
        let content = "# Daily Digest Index\n\n- **2025-05-05**\n    - [a](./a.md)\n";
        let out = insert_index_entry(content, "2025-05-06", "    - [b](./b.md)");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], INDEX_HEADING);
        assert_eq!(lines[2], "- **2025-05-06**");
        assert_eq!(lines[3], "    - [b](./b.md)");
        assert!(out.contains("- **2025-05-05**\n    - [a](./a.md)"));
    }

    #[test]
    fn test_insert_existing_date_appends_once() {
        let content = "# Daily Digest Index\n\n- **2025-05-06**\n    - [a](./a.md)\n";
        let out = insert_index_entry(content, "2025-05-06", "    - [b](./b.md)");
        assert!(out.contains("    - [a](./a.md)\n    - [b](./b.md)"));
        let again = insert_index_entry(&out, "2025-05-06", "    - [b](./b.md)");
        assert_eq!(again.matches("[b]").count(), 1);
    }

    #[tokio::test]
    async fn test_write_report_creates_file_and_index() {
        let dir = std::env::temp_dir().join(format!("news_digest_md_{}", std::process::id()));
        let dir_str = dir.to_str().unwrap().to_string();
        let digest = Digest {
            generated_at: Utc::now(),
            language: Language::En,
            keywords: vec!["AI".to_string(), "Rust".to_string()],
            news: vec![],
            report: "# Daily News Report\n".to_string(),
        };

        let path = write_report(&digest, &dir_str).await.unwrap();
        assert_eq!(fs::read_to_string(&path).await.unwrap(), digest.report);

        let index = fs::read_to_string(dir.join(INDEX_FILE)).await.unwrap();
        assert!(index.starts_with(INDEX_HEADING));
        assert!(index.contains(&report_filename(&digest)));
        assert!(index.contains("AI, Rust"));

        let _ = fs::remove_dir_all(&dir).await;
    }
}

//! Draining indices page by page.

use std::io::Write;

use anyhow::Context;
use elastic_source::{Cursor, ElasticRepository, ExtractResult, PageResult, SearchConnection};

async fn fetch<C>(
    repo: &ElasticRepository<C>,
    index: &str,
    cursor: &Cursor,
) -> ExtractResult<PageResult>
where
    C: SearchConnection + ?Sized,
{
    if repo.secondary_cursor_search_field().is_some() {
        repo.fetch_page_with_secondary_sort(index, cursor).await
    } else {
        repo.fetch_page(index, cursor).await
    }
}

/// Writes every page of `index` after `start`, returning the cursor to resume
/// from and the number of documents written.
///
/// Stops at the first empty page or after `max_pages` fetches, the empty one
/// included. The returned cursor is the one of the last non-empty page, so a
/// later run picks up after the documents written here.
pub async fn drain<C, W>(
    repo: &ElasticRepository<C>,
    index: &str,
    start: Cursor,
    max_pages: Option<usize>,
    out: &mut W,
) -> anyhow::Result<(Cursor, usize)>
where
    C: SearchConnection + ?Sized,
    W: Write,
{
    let mut cursor = start;
    let mut written = 0;
    let mut pages = 0;

    while max_pages.is_none_or(|max| pages < max) {
        let page = fetch(repo, index, &cursor)
            .await
            .with_context(|| format!("Failed to read index {} after {}", index, cursor))?;
        pages += 1;

        if page.is_empty() {
            break;
        }

        let (documents, next_cursor) = page.into_parts();
        for document in &documents {
            serde_json::to_writer(&mut *out, document)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;

        written += documents.len();
        cursor = next_cursor;
    }

    Ok((cursor, written))
}

/// A resume cursor belongs to one index; refuse to apply it to several.
pub fn check_resume_scope(cursor: Option<&str>, indices: &[String]) -> anyhow::Result<()> {
    if cursor.is_some() && indices.len() > 1 {
        anyhow::bail!(
            "--cursor resumes a single index but --index-prefix matched {}: {}",
            indices.len(),
            indices.join(", ")
        );
    }
    Ok(())
}

//! Cache management commands

use crate::cache::{CacheStats, Eviction};
use crate::cli::{CommandContext, GlobalOptions, OutputFormat};
use crate::error::Result;

/// Show cache status/statistics
pub async fn status(globals: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(globals)?;
    let store = ctx.cache_store()?;
    let stats = store.stats().await;
    let path = ctx.config.cache_dir()?.display().to_string();

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "total_entries": stats.total_entries,
                "valid_entries": stats.valid_entries,
                "expired_entries": stats.expired_entries,
                "max_entries": store.max_entries(),
                "namespace": store.namespace(),
                "oldest_entry_timestamp": stats.oldest_entry,
                "newest_entry_timestamp": stats.newest_entry,
                "path": path,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            println!("Cache Status");
            println!("────────────────────────────────────────");
            print!("{}", render_status(&stats, &path, store.max_entries()));
        }
    }

    Ok(())
}

/// Clear all cache entries
pub async fn clear(globals: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(globals)?;
    let removed = ctx.cache_store()?.evict(Eviction::All).await;
    report_removed(ctx.format, removed, "Cache was already empty")
}

/// Remove entries whose key contains `pattern`
pub async fn evict(globals: &GlobalOptions, pattern: &str) -> Result<()> {
    let ctx = CommandContext::new(globals)?;
    let removed = ctx
        .cache_store()?
        .evict(Eviction::Pattern(pattern.to_string()))
        .await;
    report_removed(ctx.format, removed, "No cache entries matched")
}

/// Show cache path
pub fn path(globals: &GlobalOptions) -> Result<()> {
    let ctx = CommandContext::new(globals)?;
    println!("{}", ctx.config.cache_dir()?.display());
    Ok(())
}

fn report_removed(format: OutputFormat, removed: usize, empty_message: &str) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "entries_removed": removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Pretty => {
            if removed > 0 {
                println!("Cleared {} cache entries", removed);
            } else {
                println!("{}", empty_message);
            }
        }
    }
    Ok(())
}

fn render_status(stats: &CacheStats, path: &str, max_entries: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Location:       {}\n", path));
    out.push_str(&format!(
        "Entries:        {} / {}\n",
        stats.total_entries, max_entries
    ));
    out.push_str(&format!("Valid entries:  {}\n", stats.valid_entries));
    out.push_str(&format!("Expired:        {}\n", stats.expired_entries));

    if let Some(oldest) = stats.oldest_entry {
        out.push_str(&format!("Oldest entry:   {}\n", format_timestamp(oldest)));
    }
    if let Some(newest) = stats.newest_entry {
        out.push_str(&format!("Newest entry:   {}\n", format_timestamp(newest)));
    }
    out
}

/// Milliseconds since the epoch as local time
fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|d| {
            d.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_empty_status() {
        let out = render_status(&CacheStats::default(), "/tmp/cache", 50);
        assert!(out.contains("Location:       /tmp/cache"));
        assert!(out.contains("Entries:        0 / 50"));
        assert!(!out.contains("Oldest entry"));
    }

    #[test]
    fn test_render_status_with_entries() {
        let stats = CacheStats {
            total_entries: 3,
            valid_entries: 2,
            expired_entries: 1,
            oldest_entry: Some(1_700_000_000_000),
            newest_entry: Some(1_700_000_060_000),
        };
        let out = render_status(&stats, "/tmp/cache", 50);
        assert!(out.contains("Valid entries:  2"));
        assert!(out.contains("Expired:        1"));
        assert!(out.contains("Oldest entry:   2023-11-"));
        assert!(out.contains("Newest entry:"));
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), "unknown");
    }
}

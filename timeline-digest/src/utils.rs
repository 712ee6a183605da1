/// Text processing utilities
pub mod text {
    const TITLE_TERMINATORS: [char; 5] = ['。', '?', '!', '？', '！'];

    /// Truncate to `max_chars` characters, appending `...` when something was cut.
    pub fn truncate_chars(text: &str, max_chars: usize) -> String {
        if text.chars().count() <= max_chars {
            return text.to_string();
        }
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head.trim_end())
    }

    /// Headline for a post: its first sentence when that is short, otherwise
    /// the first `max_chars` characters.
    pub fn extract_title(text: &str, max_chars: usize) -> String {
        let text = text.trim();
        if text.is_empty() {
            return "(untitled)".to_string();
        }

        let chars: Vec<char> = text.chars().collect();
        let limit = max_chars.min(chars.len());
        let sentence_end = (1..limit).find(|&i| {
            TITLE_TERMINATORS.contains(&chars[i])
                || (chars[i] == '.' && chars.get(i + 1).map_or(true, |c| c.is_whitespace()))
        });

        match sentence_end {
            Some(end) => chars[..=end].iter().collect(),
            None => truncate_chars(text, max_chars),
        }
    }

    /// `1234` becomes `1.2K`, `2500000` becomes `2.5M`.
    pub fn format_count(count: u64) -> String {
        if count >= 1_000_000 {
            format!("{:.1}M", count as f64 / 1_000_000.0)
        } else if count >= 1_000 {
            format!("{:.1}K", count as f64 / 1_000.0)
        } else {
            count.to_string()
        }
    }

    /// Parses display counts such as `"1,024"`, `"1.2K"` or `"3M"`.
    pub fn parse_count(raw: &str) -> Option<u64> {
        let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() {
            return None;
        }

        let (number, multiplier) = match cleaned.chars().last() {
            Some('k') | Some('K') => (&cleaned[..cleaned.len() - 1], 1_000.0),
            Some('m') | Some('M') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
            _ => (cleaned.as_str(), 1.0),
        };

        let value: f64 = number.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        Some((value * multiplier).round() as u64)
    }

    /// Pulls the post id out of a `/user/status/<id>` link.
    pub fn status_id_from_url(link: &str) -> Option<String> {
        let (_, rest) = link.split_once("/status/")?;
        let id: String = rest
            .chars()
            .take_while(|c| !matches!(c, '/' | '?' | '#'))
            .collect();
        if id.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    /// Splits a message into chunks of at most `max_chars` characters,
    /// preferring line boundaries. Lines longer than the limit are hard-split.
    pub fn chunk_by_lines(message: &str, max_chars: usize) -> Vec<String> {
        let max_chars = max_chars.max(1);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for line in message.lines() {
            let pieces: Vec<String> = if line.chars().count() > max_chars {
                line.chars()
                    .collect::<Vec<_>>()
                    .chunks(max_chars)
                    .map(|piece| piece.iter().collect())
                    .collect()
            } else {
                vec![line.to_string()]
            };

            for piece in pieces {
                let piece_len = piece.chars().count();
                let needed = if current.is_empty() { piece_len } else { piece_len + 1 };
                if current_len + needed > max_chars && !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                if !current.is_empty() {
                    current.push('\n');
                    current_len += 1;
                }
                current.push_str(&piece);
                current_len += piece_len;
            }
        }

        if !current.trim().is_empty() {
            chunks.push(current);
        }
        chunks
    }

    /// Inserts line breaks after sentence ends once a line is reasonably long.
    pub fn wrap_sentences(text: &str, width: usize) -> String {
        if text.chars().count() <= width {
            return text.to_string();
        }

        let threshold = width * 7 / 10;
        let mut wrapped = String::with_capacity(text.len());
        let mut line_len = 0;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            if line_len == 0 && c == ' ' {
                continue;
            }
            wrapped.push(c);
            line_len += 1;

            let sentence_end = matches!(c, '。' | '!' | '?' | '！' | '？')
                || (c == '.' && chars.peek().map_or(false, |next| *next == ' '));
            if sentence_end && line_len >= threshold && chars.peek().is_some() {
                wrapped.push('\n');
                line_len = 0;
            }
        }
        wrapped
    }

    /// A few representative words from the first posts of a cluster.
    pub fn sample_keywords<'a, I>(texts: I, limit: usize) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let words: Vec<&str> = texts
            .into_iter()
            .take(limit)
            .filter_map(|text| {
                text.split(|c: char| matches!(c, ',' | '，' | '。') || c.is_whitespace())
                    .find(|word| (3..=15).contains(&word.chars().count()))
            })
            .collect();

        if words.is_empty() {
            "mixed updates".to_string()
        } else {
            words.join(", ")
        }
    }
}

/// URL utilities
pub mod url {
    use url::Url;

    /// Only absolute http(s) URLs are usable as endpoints.
    pub fn is_valid_http_url(url_str: &str) -> bool {
        match Url::parse(url_str) {
            Ok(url) => (url.scheme() == "http" || url.scheme() == "https") && url.has_host(),
            Err(_) => false,
        }
    }
}

/// Time utilities
pub mod time {
    use chrono::{DateTime, Utc};

    /// Coarse "how long ago" label relative to `now`.
    pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
        let elapsed = now.signed_duration_since(at);
        let hours = elapsed.num_hours();
        let minutes = elapsed.num_minutes();

        if hours > 24 {
            format!("{}d ago", hours / 24)
        } else if hours > 0 {
            format!("{}h ago", hours)
        } else if minutes > 0 {
            format!("{}m ago", minutes)
        } else {
            "just now".to_string()
        }
    }

    pub fn format_window_bound(at: DateTime<Utc>) -> String {
        at.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Retry helpers shared by the HTTP adapters
pub mod http {
    use backoff::exponential::ExponentialBackoff;
    use backoff::SystemClock;
    use std::time::Duration;

    /// Doubling backoff starting at `initial`, capped at 32x.
    pub fn retry_backoff(initial: Duration) -> ExponentialBackoff<SystemClock> {
        ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: initial * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(initial * 60),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::text::*;
    use super::time::relative_time;
    use super::url::is_valid_http_url;
    use chrono::{TimeDelta, Utc};

    #[test]
    fn parses_display_counts() {
        assert_eq!(parse_count("1,024"), Some(1024));
        assert_eq!(parse_count("1.2K"), Some(1200));
        assert_eq!(parse_count("3M"), Some(3_000_000));
        assert_eq!(parse_count(" 42 "), Some(42));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("lots"), None);
    }

    #[test]
    fn formats_counts() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1234), "1.2K");
        assert_eq!(format_count(2_500_000), "2.5M");
    }

    #[test]
    fn extracts_status_ids() {
        assert_eq!(
            status_id_from_url("https://x.com/alice/status/12345"),
            Some("12345".to_string())
        );
        assert_eq!(
            status_id_from_url("/alice/status/999/photo/1"),
            Some("999".to_string())
        );
        assert_eq!(status_id_from_url("https://x.com/alice"), None);
    }

    #[test]
    fn titles_stop_at_first_sentence() {
        assert_eq!(extract_title("Big news! More later", 60), "Big news!");
        assert_eq!(extract_title("v1.2 is out", 60), "v1.2 is out");
        assert_eq!(extract_title("", 60), "(untitled)");
        let long = "a".repeat(70);
        assert_eq!(extract_title(&long, 60), format!("{}...", "a".repeat(60)));
    }

    #[test]
    fn chunks_respect_line_boundaries() {
        let message = "first line\nsecond line\nthird";
        let chunks = chunk_by_lines(message, 22);
        assert_eq!(chunks, vec!["first line\nsecond line", "third"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 22));

        let long = "x".repeat(25);
        let chunks = chunk_by_lines(&long, 10);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn relative_time_buckets() {
        let now = Utc::now();
        assert_eq!(relative_time(now, now), "just now");
        assert_eq!(relative_time(now - TimeDelta::minutes(5), now), "5m ago");
        assert_eq!(relative_time(now - TimeDelta::hours(3), now), "3h ago");
        assert_eq!(relative_time(now - TimeDelta::hours(50), now), "2d ago");
    }

    #[test]
    fn keywords_fall_back_when_nothing_fits() {
        assert_eq!(sample_keywords(["a b", "xy"], 3), "mixed updates");
        assert_eq!(sample_keywords(["Rollups are neat"], 3), "Rollups");
    }

    #[test]
    fn only_http_urls_are_valid() {
        assert!(is_valid_http_url("https://example.com/timeline"));
        assert!(!is_valid_http_url("ftp://example.com"));
        assert!(!is_valid_http_url("not a url"));
    }
}

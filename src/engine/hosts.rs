//! Hosts-file format parsing for blocklist ingestion.

/// Extracts blockable domains from hosts-file text.
///
/// A line contributes a domain when it is non-empty after trimming, does not
/// start with `#`, and has at least two whitespace-separated fields; the
/// second field, lowercased, is the domain. The first field is not inspected,
/// so both the strict `0.0.0.0 example.com` / `127.0.0.1 example.com` forms
/// and looser variants parse the same way.
pub fn parse_hosts(text: &str) -> Vec<String> {
    let mut domains = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        // Skip comments and empty lines
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let _addr = fields.next();
        if let Some(domain) = fields.next() {
            domains.push(domain.to_ascii_lowercase());
        }
    }
    domains
}

//! Email whitelist for the dashboard.

/// Who may use the dashboard, by email address.
///
/// Entries are `*` (everyone), `@example.com` or `example.com` (domain),
/// or `user@example.com` (exact, case-insensitive). An empty list allows
/// nobody.
#[derive(Debug, Clone, Default)]
pub struct AccessList {
    entries: Vec<String>,
}

impl AccessList {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn allows_everyone(&self) -> bool {
        self.entries.iter().any(|e| e == "*")
    }

    pub fn is_allowed(&self, email: &str) -> bool {
        if self.allows_everyone() {
            return true;
        }
        let email = email.trim().to_lowercase();
        self.entries.iter().any(|entry| {
            if entry.starts_with('@') {
                email.ends_with(entry.as_str())
            } else if entry.contains('@') {
                *entry == email
            } else {
                email.ends_with(&format!("@{entry}"))
            }
        })
    }
}

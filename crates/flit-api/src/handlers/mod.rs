pub mod follows;
pub mod notifications;
pub mod posts;
pub mod realtime;
pub mod timeline;

use serde::Deserialize;

/// Shared `?limit&offset` query parameters (spec §6.1).
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn limit_or(&self, default: i64) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(default)
    }

    pub fn offset_or_zero(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_limit_uses_default() {
        let p = PaginationParams { limit: None, offset: None };
        assert_eq!(p.limit_or(20), 20);
    }

    #[test]
    fn zero_or_negative_limit_falls_back_to_default() {
        let p = PaginationParams { limit: Some(0), offset: None };
        assert_eq!(p.limit_or(20), 20);
        let p = PaginationParams { limit: Some(-5), offset: None };
        assert_eq!(p.limit_or(20), 20);
    }

    #[test]
    fn positive_limit_is_respected() {
        let p = PaginationParams { limit: Some(7), offset: None };
        assert_eq!(p.limit_or(20), 7);
    }

    #[test]
    fn negative_offset_clamps_to_zero() {
        let p = PaginationParams { limit: None, offset: Some(-3) };
        assert_eq!(p.offset_or_zero(), 0);
    }

    #[test]
    fn positive_offset_is_respected() {
        let p = PaginationParams { limit: None, offset: Some(42) };
        assert_eq!(p.offset_or_zero(), 42);
    }
}

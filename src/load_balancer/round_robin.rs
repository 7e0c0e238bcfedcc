//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::backend::Backend;

/// Advance the shared cursor and index into the current healthy set.
///
/// The cursor is global, not tied to a backend: when the healthy set grows or
/// shrinks between calls the rotation shifts accordingly.
pub fn pick<'a>(backends: &'a [Arc<Backend>], cursor: &AtomicUsize) -> Option<&'a Arc<Backend>> {
    if backends.is_empty() {
        return None;
    }

    let n = cursor.fetch_add(1, Ordering::Relaxed);
    backends.get(n % backends.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::parse_endpoint;

    fn backend(port: u16) -> Arc<Backend> {
        let url = parse_endpoint(&format!("http://127.0.0.1:{port}")).unwrap();
        Arc::new(Backend::new(url))
    }

    #[test]
    fn test_round_robin() {
        let cursor = AtomicUsize::new(0);
        let b1 = backend(8080);
        let b2 = backend(8081);
        let backends = vec![b1.clone(), b2.clone()];

        let s1 = pick(&backends, &cursor).unwrap();
        assert_eq!(s1.url(), b1.url());

        let s2 = pick(&backends, &cursor).unwrap();
        assert_eq!(s2.url(), b2.url());

        let s3 = pick(&backends, &cursor).unwrap();
        assert_eq!(s3.url(), b1.url());
    }

    #[test]
    fn cursor_survives_set_changes() {
        let cursor = AtomicUsize::new(0);
        let all: Vec<_> = (0..3).map(|i| backend(9000 + i)).collect();

        assert_eq!(pick(&all, &cursor).unwrap().url(), all[0].url());
        assert_eq!(pick(&all, &cursor).unwrap().url(), all[1].url());

        // backend #1 dropped out of the healthy set; cursor is now 2
        let shrunk = vec![all[0].clone(), all[2].clone()];
        assert_eq!(pick(&shrunk, &cursor).unwrap().url(), all[0].url());
        assert_eq!(pick(&shrunk, &cursor).unwrap().url(), all[2].url());
    }

    #[test]
    fn empty_set_does_not_advance() {
        let cursor = AtomicUsize::new(7);
        assert!(pick(&[], &cursor).is_none());
        assert_eq!(cursor.load(Ordering::Relaxed), 7);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use clap::Parser;
    use tempfile::tempdir;
    use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};

    use crate::engine::{
        classify, collect_unique, default_concurrency, is_valid_ipv4, DomainSink, Engine,
        QueryVerdict, ScanConfig, DEFAULT_BATCH_SIZE,
    };
    use crate::{load_resolvers, load_wordlist, Args};

    #[test]
    fn args_parse_domains_and_defaults() {
        let args = Args::try_parse_from([
            "subsweep",
            "-d",
            "example.com,example.org",
            "-r",
            "resolvers.txt",
            "-w",
            "words.txt",
        ])
        .unwrap();

        assert_eq!(args.domains, vec!["example.com", "example.org"]);
        assert_eq!(args.timeout, 3);
        assert_eq!(args.batch_size, DEFAULT_BATCH_SIZE);
        assert!(args.concurrency.is_none());
        assert!(!args.debug);
    }

    #[test]
    fn ipv4_validator_accepts_dotted_quads() {
        assert!(is_valid_ipv4("8.8.8.8"));
        assert!(is_valid_ipv4("0.0.0.0"));
        assert!(is_valid_ipv4("255.255.255.255"));
    }

    #[test]
    fn ipv4_validator_rejects_malformed() {
        for bad in ["1.2.3", "1.2.3.4.5", "1.2.3.256", "a.b.c.d", "", "1.2.3.", "1..2.3", "1.2.3.-4"] {
            assert!(!is_valid_ipv4(bad), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn resolver_file_loading_drops_invalid_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("resolvers.txt");
        std::fs::write(&path, "8.8.8.8\n\nnot-an-ip\n1.1.1.1\n300.1.1.1\n").unwrap();

        let resolvers = load_resolvers(&path).unwrap();
        assert_eq!(resolvers, vec!["8.8.8.8".to_string(), "1.1.1.1".to_string()]);
    }

    #[test]
    fn wordlist_loading_keeps_lines_verbatim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "www\nmail\n\nstage-01\n").unwrap();

        let words = load_wordlist(&path).unwrap();
        assert_eq!(words, vec!["www", "mail", "stage-01"]);
    }

    #[test]
    fn batch_partitioning_is_ceil_div() {
        let candidates: Vec<String> = (0..10).map(|i| format!("w{}", i)).collect();

        let batches: Vec<&[String]> = candidates.chunks(3).collect();
        assert_eq!(batches.len(), 4);
        assert_eq!(batches[3].len(), 1);

        let even: Vec<&[String]> = candidates.chunks(5).collect();
        assert_eq!(even.len(), 2);
        assert_eq!(even[1].len(), 5);
    }

    #[test]
    fn batch_dedup_collapses_duplicate_hosts() {
        // same hostname confirmed through two resolvers
        let verdicts = vec![
            QueryVerdict::Confirmed("www.example.com".into()),
            QueryVerdict::Confirmed("www.example.com".into()),
            QueryVerdict::Negative,
            QueryVerdict::Confirmed("mail.example.com".into()),
        ];

        let unique = collect_unique(verdicts).unwrap();
        assert_eq!(unique.len(), 2);
        assert!(unique.contains("www.example.com"));
        assert!(unique.contains("mail.example.com"));
    }

    #[test]
    fn fatal_verdict_aborts_batch_collection() {
        let verdicts = vec![
            QueryVerdict::Confirmed("www.example.com".into()),
            QueryVerdict::Fatal(ResolveError::from(ResolveErrorKind::Msg(
                "socket tables exhausted".to_string(),
            ))),
        ];

        assert!(collect_unique(verdicts).is_err());
    }

    #[test]
    fn timeout_is_recoverable_negative() {
        let verdict = classify(ResolveError::from(ResolveErrorKind::Timeout));
        assert!(matches!(verdict, QueryVerdict::Negative));
    }

    #[test]
    fn unrecognized_error_is_fatal() {
        let verdict = classify(ResolveError::from(ResolveErrorKind::Msg(
            "resource exhausted".to_string(),
        )));
        assert!(matches!(verdict, QueryVerdict::Fatal(_)));
    }

    #[test]
    fn default_concurrency_is_positive() {
        assert!(default_concurrency() >= 2);
    }

    #[tokio::test]
    async fn sink_appends_across_batches_without_dedup() {
        let dir = tempdir().unwrap();
        let mut sink = DomainSink::open(dir.path(), "example.com").await.unwrap();

        let mut first = HashSet::new();
        first.insert("www.example.com".to_string());
        sink.append_batch(&first).await.unwrap();

        // the same hostname confirmed again in a later batch is written again
        let mut second = HashSet::new();
        second.insert("www.example.com".to_string());
        second.insert("mail.example.com".to_string());
        sink.append_batch(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(dir.path().join("example.com.txt"))
            .await
            .unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines.iter().filter(|l| **l == "www.example.com").count(),
            2
        );
        assert_eq!(
            lines.iter().filter(|l| **l == "mail.example.com").count(),
            1
        );
    }

    #[tokio::test]
    async fn sink_flushes_completed_batches() {
        let dir = tempdir().unwrap();
        let mut sink = DomainSink::open(dir.path(), "example.com").await.unwrap();

        let mut batch = HashSet::new();
        batch.insert("api.example.com".to_string());
        sink.append_batch(&batch).await.unwrap();

        // durable before the sink is dropped, as an interrupted run would leave it
        let contents = std::fs::read_to_string(dir.path().join("example.com.txt")).unwrap();
        assert_eq!(contents, "api.example.com\n");
    }

    #[tokio::test]
    async fn empty_resolver_pool_processes_no_domains() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let config = ScanConfig {
            domains: vec!["example.com".to_string()],
            resolvers: Vec::new(),
            candidates: vec!["www".to_string()],
            timeout: Duration::from_secs(1),
            concurrency: 4,
            batch_size: DEFAULT_BATCH_SIZE,
            output_dir: out.clone(),
        };

        let summary = Engine::new(config).run().await.unwrap();
        assert_eq!(summary.resolvers_validated, 0);
        assert_eq!(summary.domains_processed, 0);
        assert_eq!(summary.hostnames_found, 0);
        assert!(!out.exists());
    }
}

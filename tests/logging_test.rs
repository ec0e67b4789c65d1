use peerchat::logging::init_logging;

#[test]
fn test_file_log_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let log_dir = dir.path().join("logs");

    let guard = init_logging(&log_dir, "peerchat.log").unwrap();
    tracing::info!("logging started");
    drop(guard);

    let written: Vec<_> = std::fs::read_dir(&log_dir)
        .unwrap()
        .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
        .collect();
    assert_eq!(written.len(), 1);
    assert!(written[0].contains("logging started"));
}

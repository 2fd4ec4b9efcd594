use super::*;
use async_trait::async_trait;
use crate::storage::MemoryCollection;

fn repo(cohort: Cohort) -> RecordRepository {
    RecordRepository::new(cohort, Arc::new(MemoryCollection::new(cohort.collection_name())), DEFAULT_STORE_TIMEOUT)
}

fn cand(ht: &str, email: &str, gpa: f64) -> StudentCandidate {
    StudentCandidate { hall_ticket: Some(ht.into()), email: Some(email.into()), gpa: Some(gpa), cohort_label: None }
}

#[tokio::test]
async fn create_rejects_duplicates_in_every_cohort() {
    for cohort in Cohort::ALL {
        let r = repo(cohort);
        let rec = r.create(&cand("HT1", "a@x.com", 8.5)).await.unwrap();
        assert_eq!(rec.cohort_label, cohort.roman());

        let err = r.create(&cand("HT1", "other@x.com", 7.0)).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(DuplicateField::HallTicket)), "{cohort}: {err}");

        let err = r.create(&cand("HT2", "a@x.com", 7.0)).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(DuplicateField::Email)), "{cohort}: {err}");

        // Both collide: hall ticket is reported.
        let err = r.create(&cand("HT1", "a@x.com", 7.0)).await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(DuplicateField::HallTicket)), "{cohort}: {err}");

        assert_eq!(r.list_all().await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn hall_ticket_conflict_wins_over_earlier_email_match() {
    let r = repo(Cohort::FirstYear);
    r.create(&cand("HT1", "one@x.com", 1.0)).await.unwrap();
    r.create(&cand("HT2", "two@x.com", 2.0)).await.unwrap();
    // Email matches row 1, hall ticket matches row 2.
    let err = r.create(&cand("HT2", "one@x.com", 3.0)).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(DuplicateField::HallTicket)), "{err}");

    let err = r.create(&cand("HT3", "two@x.com", 3.0)).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(DuplicateField::Email)), "{err}");
    assert_eq!(r.list_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_validates_input() {
    let r = repo(Cohort::SecondYear);
    let missing_ticket = StudentCandidate { hall_ticket: Some("  ".into()), ..cand("x", "e@x.com", 5.0) };
    assert!(matches!(r.create(&missing_ticket).await, Err(RepoError::Invalid(_))));
    let missing_email = StudentCandidate { email: None, ..cand("HT", "e", 5.0) };
    assert!(matches!(r.create(&missing_email).await, Err(RepoError::Invalid(_))));
    assert!(matches!(r.create(&cand("HT", "e@x.com", 10.5)).await, Err(RepoError::Invalid(_))));
    assert!(matches!(r.create(&cand("HT", "e@x.com", -0.1)).await, Err(RepoError::Invalid(_))));
    let no_gpa = StudentCandidate { gpa: None, ..cand("HT", "e@x.com", 0.0) };
    assert!(matches!(r.create(&no_gpa).await, Err(RepoError::Invalid(_))));

    let labelled = StudentCandidate { cohort_label: Some("II".into()), ..cand(" HT9 ", " e9@x.com ", 10.0) };
    let rec = r.create(&labelled).await.unwrap();
    assert_eq!(rec.hall_ticket, "HT9");
    assert_eq!(rec.email, "e9@x.com");
    assert_eq!(rec.cohort_label, "II");
}

#[tokio::test]
async fn update_is_partial_and_keeps_id() {
    let r = repo(Cohort::ThirdYear);
    let rec = r.create(&cand("HT1", "a@x.com", 6.0)).await.unwrap();
    let patch = StudentPatch { gpa: Some(9.0), ..Default::default() };
    let out = r.update(&rec.id, &patch).await.unwrap();
    assert_eq!(out.id, rec.id);
    assert_eq!(out.gpa, 9.0);
    assert_eq!(out.hall_ticket, "HT1");

    assert!(matches!(r.update("no-such-id", &patch).await, Err(RepoError::NotFound)));
    let bad = StudentPatch { gpa: Some(11.0), ..Default::default() };
    assert!(matches!(r.update(&rec.id, &bad).await, Err(RepoError::Invalid(_))));
}

#[tokio::test]
async fn update_does_not_recheck_uniqueness() {
    let r = repo(Cohort::FirstYear);
    r.create(&cand("HT1", "a@x.com", 6.0)).await.unwrap();
    let b = r.create(&cand("HT2", "b@x.com", 6.0)).await.unwrap();
    let patch = StudentPatch { hall_ticket: Some("HT1".into()), ..Default::default() };
    let out = r.update(&b.id, &patch).await.unwrap();
    assert_eq!(out.hall_ticket, "HT1");
}

#[tokio::test]
async fn delete_twice_is_not_found() {
    let r = repo(Cohort::FourthYear);
    r.create(&cand("HT1", "a@x.com", 6.0)).await.unwrap();
    r.delete("HT1").await.unwrap();
    assert!(matches!(r.delete("HT1").await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn search_requires_one_criterion_and_prefers_hall_ticket() {
    let r = repo(Cohort::FirstYear);
    r.create(&cand("HT1", "a@x.com", 6.0)).await.unwrap();
    r.create(&cand("HT2", "b@x.com", 7.0)).await.unwrap();

    let none = SearchQuery::default();
    assert!(matches!(r.search(&none).await, Err(RepoError::MissingCriteria)));
    let blank = SearchQuery { hall_ticket: Some("".into()), email: Some(" ".into()) };
    assert!(matches!(r.search(&blank).await, Err(RepoError::MissingCriteria)));

    let both = SearchQuery { hall_ticket: Some("HT1".into()), email: Some("b@x.com".into()) };
    assert_eq!(r.search(&both).await.unwrap().hall_ticket, "HT1");

    let by_email = SearchQuery { hall_ticket: None, email: Some("b@x.com".into()) };
    assert_eq!(r.search(&by_email).await.unwrap().hall_ticket, "HT2");

    let miss = SearchQuery { hall_ticket: Some("HT9".into()), email: None };
    assert!(matches!(r.search(&miss).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn aggregate_read_spans_cohorts_in_order() {
    let reg = PartitionRegistry::in_memory();
    let t = DEFAULT_STORE_TIMEOUT;
    RecordRepository::for_cohort(&reg, Cohort::ThirdYear, t).create(&cand("C", "c@x.com", 3.0)).await.unwrap();
    RecordRepository::for_cohort(&reg, Cohort::FirstYear, t).create(&cand("A", "a@x.com", 1.0)).await.unwrap();

    let second = RecordRepository::for_cohort(&reg, Cohort::SecondYear, t);
    assert!(second.list_all().await.unwrap().is_empty());

    let all = list_every_cohort(&reg, t).await.unwrap();
    let tickets: Vec<&str> = all.iter().map(|r| r.hall_ticket.as_str()).collect();
    assert_eq!(tickets, vec!["A", "C"]);
}

/// Collection whose calls never finish in time.
struct StalledCollection;

#[async_trait]
impl StudentCollection for StalledCollection {
    fn name(&self) -> &str { "stalled" }
    async fn find_all(&self) -> StoreResult<Vec<StudentRecord>> { std::future::pending().await }
    async fn find_one(&self, _: &StudentFilter) -> StoreResult<Option<StudentRecord>> { std::future::pending().await }
    async fn insert(&self, _: NewStudent) -> StoreResult<StudentRecord> { std::future::pending().await }
    async fn update_by_id(&self, _: &str, _: &StudentPatch) -> StoreResult<Option<StudentRecord>> { std::future::pending().await }
    async fn delete_one(&self, _: &StudentFilter) -> StoreResult<Option<StudentRecord>> { std::future::pending().await }
}

#[tokio::test]
async fn store_calls_are_bounded_by_timeout() {
    let r = RecordRepository::new(Cohort::FirstYear, Arc::new(StalledCollection), Duration::from_millis(20));
    match r.list_all().await {
        Err(RepoError::Timeout { op, .. }) => assert_eq!(op, "find_all"),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(matches!(r.create(&cand("HT", "e@x.com", 1.0)).await, Err(RepoError::Timeout { op: "find_one", .. })));
}

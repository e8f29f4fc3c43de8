//! Integration tests for loading saved sessions into a match review

use fencing_recorder::models::{
    AnalysisFrame, CorrelationId, DetectionResult, FlagMark, PlayerPosition, RecordingSession,
    ResultSet,
};
use fencing_recorder::review::{MatchReview, SetSplitConfig};
use fencing_recorder::storage::{SaveError, SessionPersistence};
use tempfile::TempDir;
use uuid::Uuid;

fn frame(timestamp: f64, people: u32) -> AnalysisFrame {
    let (left, right) = if people == 2 {
        (
            Some(PlayerPosition { x: 100, y: 300 }),
            Some(PlayerPosition { x: 500, y: 310 }),
        )
    } else {
        (None, None)
    };
    AnalysisFrame::new(
        timestamp,
        DetectionResult {
            request_id: CorrelationId::generate(),
            people,
            left,
            right,
        },
    )
}

/// tc_review_001: A saved session loads into samples, sets and flags
#[tokio::test]
async fn tc_review_001_load_saved_session() {
    // Given: a persisted session with two bouts separated by a 60s break
    let root = TempDir::new().unwrap();
    let persistence = SessionPersistence::open(root.path());
    let video = root.path().join("clip.mov");
    std::fs::write(&video, b"video").unwrap();

    let mut frames: Vec<AnalysisFrame> = (0..=20).map(|i| frame(i as f64 * 5.0, 2)).collect();
    frames.push(frame(102.0, 1));
    frames.extend((0..=20).map(|i| frame(160.0 + i as f64 * 5.0, 2)));
    let flags = vec![FlagMark { flag_time: 12.0 }, FlagMark { flag_time: 170.5 }];

    let session = persistence
        .persist(
            RecordingSession::new("Final"),
            &video,
            &ResultSet::from_unsorted(frames),
            &flags,
        )
        .await
        .unwrap();

    // When: loading the review
    let review = MatchReview::load(
        session.id,
        persistence.sessions(),
        persistence.data(),
        SetSplitConfig::default(),
    )
    .await
    .unwrap();

    // Then: two sets, the one-person frame stays with the first
    assert_eq!(review.samples.len(), 43);
    assert_eq!(review.sets.len(), 2);
    assert_eq!(review.sets[0].end(), Some(102.0));
    assert_eq!(review.sets[1].start(), Some(160.0));
    assert!(review.samples[0].left.is_some());
    assert!(review.samples[21].left.is_none());
    assert_eq!(review.flags, flags);
}

/// tc_review_002: Unknown session IDs are reported as not found
#[tokio::test]
async fn tc_review_002_unknown_session() {
    let root = TempDir::new().unwrap();
    let persistence = SessionPersistence::open(root.path());

    let err = MatchReview::load(
        Uuid::new_v4(),
        persistence.sessions(),
        persistence.data(),
        SetSplitConfig::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SaveError::NotFound(_)));
}

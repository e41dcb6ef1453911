//! End-to-end runs of the standard stage graph.
//!
//! Each test wires real file-backed collaborators (cursor, sink, outbox) in a
//! temp directory with a scripted generation gateway and an in-memory feed,
//! then drives the graph from `init` to `end`.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use newsdesk_llm::{GenerationGateway, Prompt};
use newsdesk_pipeline::prompts;
use newsdesk_pipeline::{
    standard_registry, Collaborators, CursorStore, DigestNotifier, FileCursorStore, JsonlSink,
    OutboxDelivery, PipelineConfig, PipelineEvent, PipelineExecutor, SourceFeed, StageGraph,
};
use newsdesk_types::{DeliveryStatus, ItemId, NewsdeskError, Result, SourceItem, Stage};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn opinion(id: u64, text: &str) -> SourceItem {
    serde_json::from_value(json!({
        "id": id,
        "resource_uri": format!("https://www.courtlistener.com/api/rest/v3/opinions/{id}/"),
        "absolute_url": format!("/opinion/{id}/case/"),
        "plain_text": text,
        "date_created": "2024-05-01T10:00:00Z",
        "date_modified": "2024-05-02T10:00:00Z"
    }))
    .unwrap()
}

/// Serves the same items every time, honouring the cursor.
struct MemoryFeed(Vec<SourceItem>);

#[async_trait]
impl SourceFeed for MemoryFeed {
    async fn fetch_since(&self, cursor: u64) -> Result<Vec<SourceItem>> {
        Ok(self
            .0
            .iter()
            .filter(|i| i.id.0 > cursor)
            .cloned()
            .collect())
    }
}

type Script = dyn Fn(&Prompt) -> Result<Value> + Send + Sync;

/// Routes each prompt by the stage instructions it carries.
struct Newsroom {
    script: Box<Script>,
    calls: Mutex<Vec<&'static str>>,
}

impl Newsroom {
    fn new(script: impl Fn(&Prompt) -> Result<Value> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls_to(&self, stage: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|s| **s == stage).count()
    }
}

fn stage_of(prompt: &Prompt) -> &'static str {
    [
        ("leads", prompts::NEWSWORTHINESS),
        ("enrich", prompts::KEYPOINTS),
        ("draft", prompts::DRAFT),
        ("assess", prompts::ASSESS),
        ("revise", prompts::REVISE),
        ("headline", prompts::HEADLINE),
    ]
    .into_iter()
    .find(|(_, t)| t.system_message() == prompt.system)
    .map(|(name, _)| name)
    .unwrap_or("unknown")
}

#[async_trait]
impl GenerationGateway for Newsroom {
    async fn generate(&self, prompt: &Prompt) -> Result<Value> {
        self.calls.lock().unwrap().push(stage_of(prompt));
        (self.script)(prompt)
    }

    fn name(&self) -> &str {
        "newsroom"
    }
}

/// Default answers for every stage; `assess` scores come from `score`.
fn answer(prompt: &Prompt, score: impl Fn(&str) -> f64) -> Result<Value> {
    let user = &prompt.user;
    Ok(match stage_of(prompt) {
        "leads" => json!({"newsworthy": "True", "influence": "Global", "reason": "precedent"}),
        "enrich" => json!({"holding": "reversed"}),
        "draft" => {
            let name = if user.contains("alpha") { "A" } else { "B" };
            json!({"news_article": format!("{name} draft v1"), "keywords": [{"keyword": name}]})
        }
        "revise" => {
            let name = if user.contains("A draft") { "A" } else { "B" };
            json!({"news_article": format!("{name} draft v2"), "keywords": [name]})
        }
        "assess" => json!({"criteria": {"accuracy": score(user), "clarity": score(user)}}),
        "headline" => json!({"headline": "Court rules"}),
        other => panic!("unexpected prompt for {other}"),
    })
}

struct Desk {
    _dir: tempfile::TempDir,
    cursor: Arc<FileCursorStore>,
    output: std::path::PathBuf,
    outbox: std::path::PathBuf,
    collab: Collaborators,
}

fn desk(items: Vec<SourceItem>, gateway: Arc<Newsroom>, recipients: &[&str]) -> Desk {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    std::fs::write(&state_file, r#"{"last_processed_id": 0}"#).unwrap();
    let output = dir.path().join("output");
    let outbox = dir.path().join("outbox");

    let cursor = Arc::new(FileCursorStore::new(&state_file));
    let notifier = DigestNotifier::new(
        Arc::new(OutboxDelivery::new(&outbox)),
        recipients.iter().map(|r| r.to_string()).collect(),
    );
    let collab = Collaborators {
        cursor_store: cursor.clone(),
        feed: Arc::new(MemoryFeed(items)),
        gateway,
        sink: Arc::new(JsonlSink::new(&output)),
        notifier: Arc::new(notifier),
    };
    Desk {
        _dir: dir,
        cursor,
        output,
        outbox,
        collab,
    }
}

fn executor(collab: &Collaborators, config: PipelineConfig) -> PipelineExecutor {
    PipelineExecutor::new(standard_registry(collab, &config), config)
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn passing_drafts_run_straight_through() {
    let gw = Newsroom::new(|p| answer(p, |_| 9.5));
    let desk = desk(
        vec![
            opinion(11, "SUPREME COURT alpha"),
            opinion(12, "COURT OF APPEALS beta"),
        ],
        gw.clone(),
        &["editor@example.org"],
    );

    let result = executor(&desk.collab, PipelineConfig::default())
        .run(&StageGraph::standard())
        .await
        .unwrap();

    assert_eq!(
        result.stage_trace,
        vec![
            Stage::Init,
            Stage::Fetch,
            Stage::FilterLeads,
            Stage::Enrich,
            Stage::Draft,
            Stage::Assess,
            Stage::Headline,
            Stage::Finalize,
            Stage::Notify,
            Stage::End,
        ]
    );
    let state = &result.state;
    assert_eq!(state.cursor, 12);
    assert_eq!(state.candidate_items.len(), 2);
    // Only the marked court reaches the gateway.
    assert_eq!(gw.calls_to("leads"), 1);
    assert_eq!(state.output_count, Some(1));
    assert_eq!(state.delivery_status, Some(DeliveryStatus::Done));
    assert_eq!(state.finalized_items[0].headline, "Court rules");
    assert_eq!(state.finalized_items[0].keywords, vec!["A"]);

    let location = state.output_location.as_deref().unwrap();
    assert!(Path::new(location).starts_with(&desk.output));
    let text = std::fs::read_to_string(location).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert_eq!(count_files(&desk.outbox), 1);

    // The cursor is persisted by the caller after a successful run.
    desk.cursor.save(state.cursor).await.unwrap();
    assert_eq!(desk.cursor.load().await.unwrap(), 12);
}

// ---------------------------------------------------------------------------
// Scenario D: the tracker keeps each item's best version across passes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tracker_keeps_best_scores_across_revision() {
    let gw = Newsroom::new(|p| {
        if stage_of(p) == "revise" && p.user.contains("B draft") {
            return Err(NewsdeskError::MalformedOutput("truncated".into()));
        }
        answer(p, |user| {
            if user.contains("A draft v1") {
                7.0
            } else if user.contains("A draft v2") {
                6.0
            } else {
                9.0
            }
        })
    });
    let desk = desk(
        vec![opinion(1, "SUPREME COURT alpha"), opinion(2, "SUPREME COURT beta")],
        gw.clone(),
        &["editor@example.org"],
    );
    let config = PipelineConfig {
        max_attempts: 2,
        ..PipelineConfig::default()
    };
    let exec = executor(&desk.collab, config);
    let mut rx = exec.events().subscribe();

    let result = exec.run(&StageGraph::standard()).await.unwrap();

    assert_eq!(result.revisions(), 1);
    assert_eq!(gw.calls_to("assess"), 3);
    let best = &result.state.best_drafts;
    assert_eq!(best.len(), 2);
    let a = best.get(ItemId(1)).unwrap();
    assert_eq!(a.score, 7.0);
    assert_eq!(a.body, json!("A draft v1"));
    assert_eq!(best.get(ItemId(2)).unwrap().score, 9.0);

    // B's failed revision removed it from the live drafts.
    let ids: Vec<ItemId> = result.state.drafts.iter().map(|d| d.id).collect();
    assert_eq!(ids, vec![ItemId(1)]);
    assert_eq!(result.state.output_count, Some(1));

    let mut failed = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let PipelineEvent::ItemFailed { stage, item, .. } = event {
            failed.push((stage, item));
        }
    }
    assert_eq!(failed, vec![(Stage::Revise, ItemId(2))]);
}

// ---------------------------------------------------------------------------
// Scenario E: nothing new upstream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_feed_still_reaches_end() {
    let gw = Newsroom::new(|p| answer(p, |_| 9.0));
    let desk = desk(vec![], gw.clone(), &["editor@example.org"]);

    let result = executor(&desk.collab, PipelineConfig::default())
        .run(&StageGraph::standard())
        .await
        .unwrap();

    assert_eq!(result.stage_trace.last(), Some(&Stage::End));
    assert!(result.stage_trace.contains(&Stage::Notify));
    assert_eq!(result.state.output_count, Some(0));
    assert_eq!(result.state.delivery_status, Some(DeliveryStatus::Skipped));
    assert_eq!(result.state.cursor, 0);
    assert_eq!(gw.calls.lock().unwrap().len(), 0);
    assert_eq!(count_files(&desk.outbox), 0);
}

// ---------------------------------------------------------------------------
// Revision bound
// ---------------------------------------------------------------------------

#[tokio::test]
async fn revise_runs_at_most_max_attempts_minus_one() {
    for max_attempts in 1..=5 {
        let gw = Newsroom::new(|p| answer(p, |_| 5.0));
        let desk = desk(vec![opinion(1, "SUPREME COURT alpha")], gw.clone(), &[]);
        let config = PipelineConfig {
            max_attempts,
            ..PipelineConfig::default()
        };
        let result = executor(&desk.collab, config)
            .run(&StageGraph::standard())
            .await
            .unwrap();

        let expected = (max_attempts - 1) as usize;
        assert_eq!(result.revisions(), expected, "max_attempts {max_attempts}");
        assert_eq!(gw.calls_to("revise"), expected);
        // Exhausted attempts still publish the last version.
        assert_eq!(result.state.output_count, Some(1));
        assert_eq!(result.state.delivery_status, Some(DeliveryStatus::Skipped));
    }
}

// ---------------------------------------------------------------------------
// Stage outputs never grow
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stage_outputs_never_exceed_inputs() {
    let flaky = Arc::new(AtomicUsize::new(0));
    let counter = flaky.clone();
    let gw = Newsroom::new(move |p| {
        // Every third call fails, across all stages.
        if counter.fetch_add(1, Ordering::SeqCst) % 3 == 2 {
            return Err(NewsdeskError::MalformedOutput("noise".into()));
        }
        answer(p, |_| 9.0)
    });
    let items: Vec<_> = (1..=6)
        .map(|i| opinion(i, if i % 2 == 0 { "SUPREME COURT beta" } else { "SUPREME COURT alpha" }))
        .collect();
    let desk = desk(items, gw, &["editor@example.org"]);

    let result = executor(&desk.collab, PipelineConfig::default())
        .run(&StageGraph::standard())
        .await
        .unwrap();

    let s = &result.state;
    assert!(s.accepted_items.len() <= s.candidate_items.len());
    assert!(s.enriched_items.len() <= s.accepted_items.len());
    assert!(s.drafts.len() <= s.enriched_items.len());
    assert!(s.finalized_items.len() <= s.drafts.len());
    assert_eq!(s.output_count, Some(s.finalized_items.len()));
}

// ---------------------------------------------------------------------------
// Fatal errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_state_file_aborts_before_fetch() {
    let gw = Newsroom::new(|p| answer(p, |_| 9.0));
    let desk = desk(vec![opinion(1, "SUPREME COURT alpha")], gw.clone(), &[]);
    std::fs::remove_file(desk.cursor.path()).unwrap();

    let err = executor(&desk.collab, PipelineConfig::default())
        .run(&StageGraph::standard())
        .await
        .unwrap_err();
    assert!(matches!(err, NewsdeskError::Config(_)));
    assert_eq!(gw.calls.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn authentication_failure_aborts_the_run() {
    let gw = Newsroom::new(|_| {
        Err(NewsdeskError::AuthError {
            provider: "openai".into(),
        })
    });
    let desk = desk(vec![opinion(1, "SUPREME COURT alpha")], gw, &[]);
    let err = executor(&desk.collab, PipelineConfig::default())
        .run(&StageGraph::standard())
        .await
        .unwrap_err();
    assert!(matches!(err, NewsdeskError::AuthError { .. }));
    assert_eq!(count_files(&desk.output), 0);
}

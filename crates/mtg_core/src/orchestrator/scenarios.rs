//! End-to-end runs against in-process collaborators.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::fakes::{
    context, services, settings, FakeDecoder, PanickingTranscriber, ScriptedInference,
    ScriptedTranscriber,
};
use super::*;
use crate::transcription::{Transcriber, Transcript, TranscriptSegment};

struct Run {
    outcome: RunOutcome,
    events: Vec<ProgressEvent>,
}

fn run_with(
    decoder: FakeDecoder,
    transcriber: Arc<dyn Transcriber>,
    inference: Arc<ScriptedInference>,
    prepare: impl FnOnce(&Orchestrator),
) -> (Run, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let services = services(&settings, decoder, transcriber, inference);
    let ctx = context(settings, services);

    let mut orchestrator = Orchestrator::new();
    let receiver = orchestrator.subscribe(64);
    prepare(&orchestrator);
    let outcome = orchestrator.run(&ctx);
    let events = receiver.drain();

    assert_valid_history(&outcome.history);
    assert_event_order(&events);
    (Run { outcome, events }, dir)
}

fn five_minute_meeting() -> FakeDecoder {
    FakeDecoder::new(300, vec![0, 60, 150, 240])
}

/// Every status change is a legal transition and no ordinal is skipped.
fn assert_valid_history(history: &[RunStatus]) {
    assert_eq!(history.first(), Some(&RunStatus::Pending));
    for pair in history.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "illegal transition {} -> {}",
            pair[0],
            pair[1]
        );
    }
    let running: Vec<u32> = history
        .iter()
        .filter_map(|s| match s {
            RunStatus::Running(stage) => Some(stage.ordinal()),
            _ => None,
        })
        .collect();
    for (i, ordinal) in running.iter().enumerate() {
        assert_eq!(*ordinal as usize, i + 1);
    }
    assert!(history.last().is_some_and(|s| s.is_terminal()));
}

fn assert_event_order(events: &[ProgressEvent]) {
    for pair in events.windows(2) {
        assert!(pair[0].ordinal <= pair[1].ordinal);
    }
    let terminals = events.iter().filter(|e| e.is_terminal()).count();
    assert_eq!(terminals, 1);
    assert!(events.last().is_some_and(|e| e.is_terminal()));
}

fn phases(events: &[ProgressEvent]) -> Vec<(u32, ProgressPhase)> {
    events.iter().map(|e| (e.ordinal, e.phase)).collect()
}

#[test]
fn full_run_completes() {
    let inference = Arc::new(ScriptedInference::new());
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::ok()),
        Arc::clone(&inference),
        |_| {},
    );
    let state = &run.outcome.state;

    assert_eq!(state.status, RunStatus::Completed);
    let frames = state.frames().unwrap();
    assert_eq!(frames.saved.len(), 4);
    assert_eq!(frames.saved[0].timestamp_secs, 0.0);
    assert!(frames
        .saved
        .windows(2)
        .all(|w| w[0].timestamp_secs < w[1].timestamp_secs));
    assert!(frames.saved.iter().all(|f| f.path.is_file()));

    assert_eq!(state.visual().unwrap().analyses.len(), 4);
    assert_eq!(inference.image_calls.load(Ordering::SeqCst), 4);
    assert_eq!(state.text().unwrap().analyses.len(), 1);
    assert!(state.requirements().unwrap().functional_requirements.is_some());

    let mut expected: Vec<_> = (1..=6).map(|i| (i, ProgressPhase::Started)).collect();
    expected.push((6, ProgressPhase::Completed));
    assert_eq!(phases(&run.events), expected);
    assert_eq!(run.events[0].display_line(), "Step 1/6: Extracting video frames");

    let documents = state.documents().unwrap();
    assert_eq!(documents.files.len(), 2);
    assert!(documents.files.iter().all(|p| p.is_file()));
    let results = run.outcome.results_path.as_ref().unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(results).unwrap()).unwrap();
    assert_eq!(json["status"]["state"], "completed");
    assert!(!run.outcome.summary.has_degraded());
}

#[test]
fn transcription_failure_degrades_but_completes() {
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::unreachable()),
        Arc::new(ScriptedInference::new()),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Completed);
    assert!(outcome
        .history
        .contains(&RunStatus::Degraded(Stage::Transcribe)));
    assert!(outcome.state.transcript().unwrap().is_empty());

    let degraded = run
        .events
        .iter()
        .find(|e| e.phase == ProgressPhase::Degraded)
        .unwrap();
    assert_eq!(degraded.ordinal, 2);
    assert_eq!(degraded.error.as_ref().unwrap().kind, ErrorKind::Service);

    assert!(outcome.summary.has_degraded());
    assert!(outcome.summary.render().contains("DEGRADED"));

    let markdown = outcome
        .state
        .documents()
        .unwrap()
        .files
        .iter()
        .find(|p| p.extension().is_some_and(|e| e == "md"))
        .unwrap();
    let doc = std::fs::read_to_string(markdown).unwrap();
    assert!(doc.contains("WARNING"));
    assert!(doc.contains(Stage::Transcribe.label()));
}

#[test]
fn out_of_range_segment_times_do_not_abort_the_run() {
    let transcriber = ScriptedTranscriber::with(|| {
        Ok(Transcript::new(
            vec![
                TranscriptSegment::new(0.0, 12.0, "We need single sign-on."),
                TranscriptSegment::new(1e20, 1e20 + 4.0, "garbled"),
            ],
            Some("en".to_string()),
            None,
        ))
    });
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(transcriber),
        Arc::new(ScriptedInference::new()),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Completed);
    assert_eq!(outcome.state.transcript().unwrap().segments().len(), 1);
    assert_eq!(
        outcome.state.result(Stage::AnalyzeText).unwrap().outcome(),
        StageOutcome::Success
    );
    assert_eq!(outcome.state.text().unwrap().analyses.len(), 1);
    assert!(!outcome.summary.has_degraded());
}

#[test]
fn video_without_audio_skips_transcriber() {
    let mut decoder = five_minute_meeting();
    decoder.has_audio = false;
    let transcriber = Arc::new(ScriptedTranscriber::ok());
    let (run, _dir) = run_with(
        decoder,
        Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        Arc::new(ScriptedInference::new()),
        |_| {},
    );

    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(run.outcome.state.status, RunStatus::Completed);
    let err = run.outcome.state.result(Stage::Transcribe).unwrap().error().unwrap();
    assert_eq!(err.kind, ErrorKind::Decode);
}

#[test]
fn missing_video_aborts_at_first_stage() {
    let mut decoder = five_minute_meeting();
    decoder.missing_input = true;
    let transcriber = Arc::new(ScriptedTranscriber::ok());
    let (run, _dir) = run_with(
        decoder,
        Arc::clone(&transcriber) as Arc<dyn Transcriber>,
        Arc::new(ScriptedInference::new()),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(
        outcome.history,
        vec![
            RunStatus::Pending,
            RunStatus::Running(Stage::ExtractFrames),
            RunStatus::Failed(Stage::ExtractFrames),
            RunStatus::Aborted,
        ]
    );
    assert_eq!(transcriber.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        phases(&run.events),
        vec![
            (1, ProgressPhase::Started),
            (1, ProgressPhase::Failed),
            (1, ProgressPhase::Aborted),
        ]
    );
    let terminal = run.events.last().unwrap();
    assert_eq!(terminal.error.as_ref().unwrap().kind, ErrorKind::Input);

    let report = &outcome.summary.stages[0];
    assert_eq!(report.outcome, StageOutcome::Failed);
    assert_eq!(report.kind, Some(ErrorKind::Input));
    assert!(outcome
        .summary
        .stages
        .iter()
        .skip(1)
        .all(|r| r.outcome == StageOutcome::NotRun));
    assert!(outcome.results_path.as_ref().unwrap().is_file());
}

#[test]
fn decode_failure_keeps_partial_frames() {
    let mut decoder = FakeDecoder::new(20, (0..20).collect());
    decoder.fail_after = Some(8);
    let (run, _dir) = run_with(
        decoder,
        Arc::new(ScriptedTranscriber::ok()),
        Arc::new(ScriptedInference::new()),
        |_| {},
    );
    let outcome = &run.outcome;

    assert!(outcome
        .history
        .contains(&RunStatus::Degraded(Stage::ExtractFrames)));
    assert_eq!(outcome.state.status, RunStatus::Completed);

    let frames = outcome.state.frames().unwrap();
    assert_eq!(frames.saved.len(), 8);
    assert_eq!(frames.frames_scanned, 8);
    let failure = frames.decode_error.as_ref().unwrap();
    assert_eq!(failure.last_timestamp_secs, Some(7.0));

    let err = outcome.state.result(Stage::ExtractFrames).unwrap().error().unwrap();
    assert_eq!(err.kind, ErrorKind::Decode);
}

#[test]
fn cancel_during_transcription_stops_before_next_stage() {
    let orchestrator_handle = Arc::new(parking_lot::Mutex::new(None::<CancelHandle>));
    let hook_handle = Arc::clone(&orchestrator_handle);
    let transcriber = ScriptedTranscriber::ok().on_call(move || {
        if let Some(handle) = hook_handle.lock().as_ref() {
            handle.cancel();
        }
    });
    let inference = Arc::new(ScriptedInference::new());

    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(transcriber),
        Arc::clone(&inference),
        |o| *orchestrator_handle.lock() = Some(o.cancel_handle()),
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Aborted);
    assert!(outcome.state.cancelled);
    // The transcription itself completed.
    assert!(!outcome.state.transcript().unwrap().is_empty());
    assert!(run.events.iter().all(|e| e.ordinal <= 2));
    assert_eq!(inference.image_calls.load(Ordering::SeqCst), 0);

    let terminal = run.events.last().unwrap();
    assert_eq!(terminal.phase, ProgressPhase::Aborted);
    assert_eq!(terminal.ordinal, 2);
    assert_eq!(terminal.error.as_ref().unwrap().kind, ErrorKind::Cancelled);
    assert!(outcome.summary.render().starts_with("Run cancelled"));
}

#[test]
fn cancel_before_run_emits_only_terminal_event() {
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::ok()),
        Arc::new(ScriptedInference::new()),
        |o| o.cancel_handle().cancel(),
    );

    assert_eq!(
        run.outcome.history,
        vec![RunStatus::Pending, RunStatus::Aborted]
    );
    assert_eq!(phases(&run.events), vec![(0, ProgressPhase::Aborted)]);
    assert!(run.outcome.state.stages.is_empty());
}

#[test]
fn failed_frame_descriptions_are_absorbed() {
    let mut inference = ScriptedInference::new();
    inference.failing_images = vec![1];
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::ok()),
        Arc::new(inference),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Completed);
    assert!(outcome
        .history
        .contains(&RunStatus::Degraded(Stage::AnalyzeVisuals)));
    let visual = outcome.state.visual().unwrap();
    assert_eq!(visual.analyses.len(), 3);
    assert_eq!(visual.failed.len(), 1);

    let err = outcome.state.result(Stage::AnalyzeVisuals).unwrap().error().unwrap();
    assert_eq!(err.kind, ErrorKind::PartialResult);
    assert_eq!(err.message, "1 of 4 frames failed");
}

#[test]
fn unreachable_inference_still_produces_documents() {
    let mut inference = ScriptedInference::new();
    inference.unreachable = true;
    let inference = Arc::new(inference);
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::ok()),
        Arc::clone(&inference),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Completed);
    // The batch stops calling the service after the first unreachable error.
    assert_eq!(inference.image_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.state.visual().unwrap().failed.len(), 4);

    let requirements = outcome.state.requirements().unwrap();
    assert!(requirements.note.is_some());
    assert_eq!(outcome.state.documents().unwrap().files.len(), 2);

    let degraded: Vec<_> = outcome
        .summary
        .stages
        .iter()
        .filter(|r| r.outcome == StageOutcome::Degraded)
        .map(|r| r.stage)
        .collect();
    assert_eq!(
        degraded,
        vec![
            Stage::AnalyzeVisuals,
            Stage::AnalyzeText,
            Stage::SynthesizeRequirements
        ]
    );
}

#[test]
fn stage_panic_aborts_as_internal_error() {
    let (run, _dir) = run_with(
        five_minute_meeting(),
        Arc::new(PanickingTranscriber),
        Arc::new(ScriptedInference::new()),
        |_| {},
    );
    let outcome = &run.outcome;

    assert_eq!(outcome.state.status, RunStatus::Aborted);
    assert!(!outcome.state.cancelled);
    assert!(outcome.history.contains(&RunStatus::Failed(Stage::Transcribe)));
    let err = outcome.state.result(Stage::Transcribe).unwrap().error().unwrap();
    assert_eq!(err.kind, ErrorKind::Internal);
    assert!(err.message.contains("audio buffer overflow"));
    // Frames from the first stage are preserved.
    assert_eq!(outcome.state.frames().unwrap().saved.len(), 4);
}

#[test]
fn callback_subscribers_receive_every_event() {
    let dir = tempfile::tempdir().unwrap();
    let settings = settings(dir.path());
    let services = services(
        &settings,
        five_minute_meeting(),
        Arc::new(ScriptedTranscriber::ok()),
        Arc::new(ScriptedInference::new()),
    );
    let ctx = context(settings, services);

    let mut orchestrator = Orchestrator::new();
    let lines = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let subscription = orchestrator
        .subscribe_callback(move |event| sink.lock().push(event.display_line()))
        .unwrap();
    let console = orchestrator.subscribe(64);

    orchestrator.run(&ctx);
    subscription.join();

    let lines = lines.lock();
    assert_eq!(lines.len(), 7);
    assert_eq!(console.drain().len(), 7);
    assert_eq!(lines[5], "Step 6/6: Generating SRS documents");
}

mod common;

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;

use common::*;
use wavecast_campaign::engine::Step;
use wavecast_campaign::{PriorityGate, select_next};
use wavecast_channels::signal_cli::unexpected_diagnostics;
use wavecast_core::config::SignalChannelConfig;
use wavecast_core::types::{ChannelKind, MessageKind};

fn no_shutdown() -> watch::Receiver<bool> {
    // A dropped sender leaves the flag readable and never set.
    let (_tx, rx) = watch::channel(false);
    rx
}

fn bob_catalog() -> Vec<wavecast_core::types::Message> {
    vec![
        message("w2", 2, MessageKind::Template, "Hi {name}"),
        message("w5", 5, MessageKind::Template, "Last call, {name}"),
    ]
}

#[tokio::test]
async fn test_template_wave_renders_without_generation() {
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog()));
    let provider = Arc::new(FakeProvider::default());
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let bob = recipient(0, "Bob", 1);
    let catalog = bob_catalog();
    let selected = select_next(&bob, &catalog, PriorityGate::Off).unwrap();
    assert_eq!(selected.wave, 2);
    let body = composer(provider.clone())
        .render(selected, &bob, &store.prompts, Utc::now())
        .await
        .unwrap();
    assert_eq!(body, "Hi Bob");

    let engine = engine(store.clone(), provider.clone(), channel.clone(), settings(true, true));
    let report = engine.run(no_shutdown()).await.unwrap();

    assert_eq!(report.sent(), 1);
    assert!(provider.calls.lock().await.is_empty());
    let sent = channel.sent.lock().await;
    assert_eq!(sent[0].content, "🌊\nHi Bob");
    assert_eq!(sent[0].to, "+4915100000000");
    assert_eq!(store.wave_of(0).await, Some(2));
    assert_eq!(store.log.lock().await[0].handle, "w2");
}

#[tokio::test]
async fn test_german_recipient_gets_language_directive() {
    let mut bob = recipient(0, "Bob", 1);
    bob.language = "de".into();
    let store = Arc::new(FakeStore::new(
        vec![bob],
        vec![message("w2", 2, MessageKind::Prompt, "Invite {name} to the meetup")],
    ));
    let provider = Arc::new(FakeProvider::replying("Hallo Bob, komm vorbei!"));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store, provider.clone(), channel.clone(), settings(true, false))
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.sent(), 1);
    let calls = provider.calls.lock().await;
    assert_eq!(calls[0][0].content, "You write short campaign messages.");
    assert!(calls[0][1].content.starts_with("Respond in German."));
    assert!(calls[0][1].content.ends_with("Invite Bob to the meetup"));
    assert_eq!(channel.sent.lock().await[0].content, "🌊\nHallo Bob, komm vorbei!");
}

#[tokio::test]
async fn test_empty_completion_leaves_wave_untouched() {
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1), recipient(1, "Ann", 0)],
        vec![
            message("w1", 1, MessageKind::Template, "Welcome {name}"),
            message("w2", 2, MessageKind::Prompt, "Nudge {name}"),
        ],
    ));
    let provider = Arc::new(FakeProvider::default());
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store.clone(), provider, channel.clone(), settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap();

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row, 0);
    assert_eq!(failures[0].step, Step::Render);
    assert!(failures[0].error.contains("Empty completion"));
    assert_eq!(store.wave_of(0).await, Some(1));

    // Ann's template still went out in the same pass.
    assert_eq!(store.wave_of(1).await, Some(1));
    assert_eq!(channel.sent.lock().await.len(), 1);
}

#[tokio::test]
async fn test_dry_run_never_touches_channel_or_store() {
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog()));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings(false, true))
        .run(no_shutdown())
        .await
        .unwrap();

    assert!(channel.sent.lock().await.is_empty());
    assert!(store.updates.lock().await.is_empty());
    assert!(store.log.lock().await.is_empty());
    let previews: Vec<_> = report.previews().collect();
    assert_eq!(previews.len(), 1);
    assert_eq!(previews[0].content, "🌊\nHi Bob");
    assert_eq!(report.passes[0].dry_run, 1);
}

#[tokio::test]
async fn test_hot_send_without_hot_update() {
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog()));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings(true, false))
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(channel.sent.lock().await.len(), 1);
    assert!(store.updates.lock().await.is_empty());
    assert!(store.log.lock().await.is_empty());
    assert_eq!(report.passes[0].committed, 0);
    assert_eq!(store.wave_of(0).await, Some(1));
}

#[tokio::test]
async fn test_progression_is_idempotent_across_passes() {
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1)],
        vec![message("w2", 2, MessageKind::Template, "Hi {name}")],
    ));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));
    let mut settings = settings(true, true);
    settings.loops = 3;

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.passes.len(), 3);
    assert_eq!(report.sent(), 1);
    assert_eq!(report.passes[1].skipped, 1);
    assert_eq!(channel.sent.lock().await.len(), 1);

    let updated = store.recipients.lock().await[0].clone();
    assert_eq!(updated.last_wave, 2);
    assert!(select_next(&updated, &store.messages, PriorityGate::Off).is_none());
}

#[tokio::test]
async fn test_dispatch_failure_is_isolated() {
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1), recipient(1, "Ann", 1)],
        bob_catalog(),
    ));
    let mut channel = FakeChannel::new(ChannelKind::Sms);
    channel.failing.push("+4915100000000".into());
    let channel = Arc::new(channel);

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.passes[0].failed_at(Step::Dispatch), 1);
    assert_eq!(store.wave_of(0).await, Some(1));
    assert_eq!(store.wave_of(1).await, Some(2));
    assert_eq!(store.log.lock().await.len(), 1);
}

#[tokio::test]
async fn test_missing_channel_fails_only_that_recipient() {
    let mut signal_user = recipient(1, "Sig", 1);
    signal_user.channel = ChannelKind::Signal;
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1), signal_user], bob_catalog()));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel, settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.sent(), 1);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures[0].row, 1);
    assert_eq!(failures[0].step, Step::Dispatch);
}

#[tokio::test]
async fn test_rejected_update_is_reported_after_send() {
    let mut store = FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog());
    store.reject_update = true;
    let store = Arc::new(store);
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.sent(), 1);
    assert_eq!(report.passes[0].failed_at(Step::Commit), 1);
    assert!(store.log.lock().await.is_empty());
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let mut store = FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog());
    store.fail_fetch = true;
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    let err = engine(Arc::new(store), Arc::new(FakeProvider::default()), channel.clone(), settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap_err();

    assert!(err.is_batch_fatal());
    assert!(channel.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_before_start_sends_nothing() {
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog()));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let report = engine(store, Arc::new(FakeProvider::default()), channel.clone(), settings(true, true))
        .run(rx)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(report.passes.is_empty());
    assert!(channel.sent.lock().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_mid_pass_finishes_in_flight_only() {
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1), recipient(1, "Ann", 1), recipient(2, "Cy", 1)],
        bob_catalog(),
    ));
    let (tx, rx) = watch::channel(false);
    let mut channel = FakeChannel::new(ChannelKind::Sms);
    channel.stop_after_first = Some(tx);
    let channel = Arc::new(channel);
    let mut settings = settings(true, true);
    settings.loops = 3;

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings)
        .run(rx)
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(report.passes.len(), 1);
    let pass = &report.passes[0];
    assert_eq!(pass.sent, 1);
    assert_eq!(pass.committed, 1);
    assert_eq!(pass.cancelled, 2);
    assert_eq!(channel.sent.lock().await.len(), 1);
    assert_eq!(store.wave_of(0).await, Some(2));
    assert_eq!(store.wave_of(1).await, Some(1));
    assert_eq!(store.wave_of(2).await, Some(1));
    assert!(report.to_string().contains("2 not started (cancelled)"));
}

#[tokio::test]
async fn test_log_timestamp_is_taken_after_delivery() {
    let store = Arc::new(FakeStore::new(vec![recipient(0, "Bob", 1)], bob_catalog()));
    let mut channel = FakeChannel::new(ChannelKind::Sms);
    channel.latency = std::time::Duration::from_millis(50);
    let channel = Arc::new(channel);

    engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings(true, true))
        .run(no_shutdown())
        .await
        .unwrap();

    let started = channel.started.lock().await[0];
    let logged = store.log.lock().await[0].timestamp;
    assert!(logged >= started + chrono::Duration::milliseconds(50));
}

#[tokio::test]
async fn test_author_wrap_respects_exclusions() {
    let mut store = FakeStore::new(
        vec![recipient(0, "Bob", 0), recipient(1, "Ann", 1)],
        vec![
            message("invitation", 1, MessageKind::Template, "Join us, {name}"),
            message("w2", 2, MessageKind::Template, "Hi {name}"),
        ],
    );
    store.authors = vec!["— Anna".into(), "— Ben".into()];
    let authors = store.authors.clone();
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));

    engine(Arc::new(store), Arc::new(FakeProvider::default()), channel.clone(), settings(true, false))
        .run(no_shutdown())
        .await
        .unwrap();

    let sent = channel.sent.lock().await;
    let invitation = sent.iter().find(|m| m.to == "+4915100000000").unwrap();
    assert_eq!(invitation.content, "🌊\nJoin us, Bob");
    let wave2 = sent.iter().find(|m| m.to == "+4915100000001").unwrap();
    assert!(wave2.content.starts_with("🌊\nHi Ann\n"));
    assert!(authors.iter().any(|a| wave2.content.ends_with(a.as_str())));
}

#[tokio::test]
async fn test_concurrent_pass_sends_each_recipient_once() {
    let recipients = (0..12).map(|i| recipient(i, &format!("r{i}"), 1)).collect();
    let store = Arc::new(FakeStore::new(recipients, bob_catalog()));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));
    let mut settings = settings(true, true);
    settings.concurrency = 4;

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.passes[0].sent, 12);
    let mut numbers: Vec<_> = channel.sent.lock().await.iter().map(|m| m.to.clone()).collect();
    numbers.sort();
    numbers.dedup();
    assert_eq!(numbers.len(), 12);
    assert_eq!(store.updates.lock().await.len(), 12);
}

#[tokio::test]
async fn test_priority_gate_holds_back_low_priority_waves() {
    let mut urgent = message("w3", 3, MessageKind::Template, "Urgent {name}");
    urgent.high_priority = true;
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1)],
        vec![message("w2", 2, MessageKind::Template, "Hi {name}"), urgent],
    ));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));
    let mut settings = settings(true, true);
    settings.priority_gate = PriorityGate::On;

    engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(channel.sent.lock().await[0].content, "🌊\nUrgent Bob");
    assert_eq!(store.wave_of(0).await, Some(3));
}

#[tokio::test]
async fn test_audience_narrowing_applies_before_pass() {
    let store = Arc::new(FakeStore::new(
        vec![recipient(0, "Bob", 1), recipient(1, "Ann", 1)],
        bob_catalog(),
    ));
    let channel = Arc::new(FakeChannel::new(ChannelKind::Sms));
    let mut settings = settings(true, true);
    settings.audience.canary = Some("+4915100000001".into());
    settings.audience.max_wave = Some(1);

    let report = engine(store.clone(), Arc::new(FakeProvider::default()), channel.clone(), settings)
        .run(no_shutdown())
        .await
        .unwrap();

    assert_eq!(report.passes[0].recipients, 1);
    assert_eq!(report.passes[0].skipped, 1);
    assert!(channel.sent.lock().await.is_empty());
}

#[test]
fn test_signal_benign_banner() {
    let benign = SignalChannelConfig::default().benign_stderr;
    let banner = "INFO  AccountHelper - The Signal protocol expects that incoming messages are regularly received.";
    assert!(unexpected_diagnostics(banner, &benign).is_empty());
    assert_eq!(
        unexpected_diagnostics("Failed to send message: rate limited", &benign),
        vec!["Failed to send message: rate limited"]
    );
}

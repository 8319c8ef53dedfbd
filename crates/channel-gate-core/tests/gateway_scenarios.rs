use channel_gate_core::config::GateSettings;
use channel_gate_core::gateway::{AccessGateway, AccessOutcome, AttemptKind, CallbackRequest};
use channel_gate_core::membership::{
    MembershipCache, MembershipOracle, MembershipStatus, MembershipStore, RetryPolicy,
    VerdictSource,
};
use channel_gate_core::platform::{
    ChatMemberStatus, DeliveryApi, MembershipApi, Notice, PlatformError,
};
use channel_gate_core::registry::{MediaKind, MediaRegistry, MediaStore};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CONTENT_CHANNEL: i64 = -1_002_000;

/// Membership API that replays scripted statuses and falls back to a
/// default once the script runs out.
struct ScriptedMembership {
    script: Mutex<VecDeque<Result<ChatMemberStatus, PlatformError>>>,
    default: Result<ChatMemberStatus, PlatformError>,
    lookups: AtomicUsize,
    probe_ok: bool,
}

impl ScriptedMembership {
    fn new(
        script: Vec<Result<ChatMemberStatus, PlatformError>>,
        default: Result<ChatMemberStatus, PlatformError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            lookups: AtomicUsize::new(0),
            probe_ok: false,
        }
    }

    fn always(status: ChatMemberStatus) -> Self {
        Self::new(vec![], Ok(status))
    }

    fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MembershipApi for ScriptedMembership {
    async fn get_chat_member_status(&self, _user_id: i64) -> Result<ChatMemberStatus, PlatformError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().expect("script lock").pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }

    async fn send_transient_message(&self, _user_id: i64) -> Result<i32, PlatformError> {
        if self.probe_ok {
            Ok(900)
        } else {
            Err(PlatformError::Transient("bot was blocked by the user".into()))
        }
    }

    async fn delete_message(&self, _chat_id: i64, _message_id: i32) -> Result<(), PlatformError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Media(i64, MediaKind, String),
    Notice(i64, Notice),
    Edit(i64, i32, Notice),
}

#[derive(Default)]
struct RecordingDelivery {
    sent: Mutex<Vec<Sent>>,
    fail_media: bool,
}

impl RecordingDelivery {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    fn record(&self, item: Sent) {
        self.sent.lock().expect("sent lock").push(item);
    }
}

#[async_trait::async_trait]
impl DeliveryApi for RecordingDelivery {
    async fn send_media(
        &self,
        chat_id: i64,
        kind: MediaKind,
        remote_ref: &str,
    ) -> Result<(), PlatformError> {
        if self.fail_media {
            return Err(PlatformError::Transient("file reference expired".into()));
        }
        self.record(Sent::Media(chat_id, kind, remote_ref.to_string()));
        Ok(())
    }

    async fn send_notice(&self, chat_id: i64, notice: Notice) -> Result<i32, PlatformError> {
        self.record(Sent::Notice(chat_id, notice));
        Ok(1)
    }

    async fn edit_notice(
        &self,
        chat_id: i64,
        message_id: i32,
        notice: Notice,
    ) -> Result<(), PlatformError> {
        self.record(Sent::Edit(chat_id, message_id, notice));
        Ok(())
    }
}

struct Harness {
    gateway: AccessGateway,
    oracle: Arc<MembershipOracle>,
    membership: Arc<ScriptedMembership>,
    delivery: Arc<RecordingDelivery>,
    cache: Arc<MembershipCache>,
    registry: Arc<MediaRegistry>,
}

fn harness(membership: ScriptedMembership, delivery: RecordingDelivery) -> Harness {
    let settings = Arc::new(GateSettings {
        gated_channel: "@studymaterial".to_string(),
        content_channel_id: CONTENT_CHANNEL,
        bot_username: "gate_bot".to_string(),
        ..GateSettings::default()
    });
    let membership = Arc::new(membership);
    let delivery = Arc::new(delivery);
    let cache = Arc::new(MembershipCache::new(
        settings.membership_cache_ttl_secs,
        settings.membership_cache_max_size,
    ));
    let registry = Arc::new(MediaRegistry::new(CONTENT_CHANNEL));
    let oracle = Arc::new(MembershipOracle::new(
        membership.clone(),
        cache.clone(),
        RetryPolicy::from_settings(&settings),
    ));
    let gateway = AccessGateway::new(oracle.clone(), registry.clone(), delivery.clone(), settings);

    Harness {
        gateway,
        oracle,
        membership,
        delivery,
        cache,
        registry,
    }
}

#[tokio::test]
async fn test_member_receives_freshly_posted_photo() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Member),
        RecordingDelivery::default(),
    );

    let handle = h
        .gateway
        .publish_post(CONTENT_CHANNEL, Some(MediaKind::Photo), "R1".into())
        .await
        .expect("post registered");
    assert_eq!(handle.id.get(), 1);

    // A stale denial from an earlier visit must not block the click
    h.cache.put(42, false).await;
    let outcome = h.gateway.handle_start(42, 42, "img1").await;

    assert_eq!(outcome, AccessOutcome::Delivered(handle.id));
    assert!(h
        .delivery
        .sent()
        .contains(&Sent::Media(42, MediaKind::Photo, "R1".into())));
    match &h.delivery.sent()[0] {
        Sent::Notice(chat, Notice::LinkIssued { link, .. }) => {
            assert_eq!(*chat, CONTENT_CHANNEL);
            assert_eq!(link, "https://t.me/gate_bot?start=img1");
        }
        other => panic!("expected link announcement, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cached_verdict_avoids_remote_calls() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Member),
        RecordingDelivery::default(),
    );

    assert!(h.oracle.is_member(7).await);
    assert!(h.oracle.is_member(7).await);
    assert_eq!(h.oracle.verify(7).await.source, VerdictSource::Cache);

    assert_eq!(h.membership.lookups(), 1);
}

#[tokio::test]
async fn test_refresh_always_goes_remote() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Administrator),
        RecordingDelivery::default(),
    );

    h.oracle.is_member(7).await;
    h.oracle.force_refresh(7).await;
    h.oracle.is_member(7).await;

    assert_eq!(h.membership.lookups(), 2);
}

#[tokio::test]
async fn test_unregistered_asset_is_not_found_for_members() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Owner),
        RecordingDelivery::default(),
    );

    let outcome = h.gateway.handle_start(42, 42, "img5").await;

    assert_eq!(outcome, AccessOutcome::NotFound);
    assert_eq!(h.delivery.sent(), vec![Sent::Notice(42, Notice::NotFound)]);
}

#[tokio::test]
async fn test_delivery_failure_is_reported_to_user() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Member),
        RecordingDelivery {
            fail_media: true,
            ..RecordingDelivery::default()
        },
    );
    let handle = h.registry.register(MediaKind::Video, "V1".into()).await;

    let outcome = h.gateway.handle_start(42, 42, "img1").await;

    assert_eq!(outcome, AccessOutcome::DeliveryFailed(handle.id));
    assert_eq!(
        h.delivery.sent(),
        vec![Sent::Notice(42, Notice::DeliveryFailed)]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_user_goes_through_challenge_and_support() {
    let h = harness(
        ScriptedMembership::new(
            vec![],
            Err(PlatformError::Transient("Too Many Requests".into())),
        ),
        RecordingDelivery::default(),
    );
    let handle = h.registry.register(MediaKind::Photo, "R1".into()).await;

    // Initial click: primary exhausts, probe fails, verdict is unknown
    let outcome = h.gateway.handle_start(42, 42, "img1").await;
    assert_eq!(outcome, AccessOutcome::Challenged(handle.id));
    assert_eq!(h.membership.lookups(), 4);
    assert_eq!(
        h.cache.peek(42).await.map(|e| e.is_member),
        Some(false)
    );

    // Forced recheck ends with the support hand-off
    let outcome = h
        .gateway
        .handle_callback(CallbackRequest {
            user_id: 42,
            chat_id: 42,
            message_id: Some(3),
            data: format!("force_check_{}", handle.id),
        })
        .await;
    assert_eq!(outcome, AccessOutcome::Exhausted(handle.id));

    let sent = h.delivery.sent();
    assert!(sent.contains(&Sent::Edit(
        42,
        3,
        Notice::Checking {
            attempt: AttemptKind::ForceRecheck
        }
    )));
    assert_eq!(
        sent.last(),
        Some(&Sent::Edit(
            42,
            3,
            Notice::Exhausted {
                asset_id: handle.id,
                user_id: 42
            }
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn test_join_after_challenge_then_recheck_delivers() {
    let h = harness(
        ScriptedMembership::new(
            vec![Ok(ChatMemberStatus::Left)],
            Ok(ChatMemberStatus::Member),
        ),
        RecordingDelivery::default(),
    );
    let handle = h.registry.register(MediaKind::Photo, "R1".into()).await;

    assert_eq!(
        h.gateway.handle_start(42, 42, "img1").await,
        AccessOutcome::Challenged(handle.id)
    );

    let started = tokio::time::Instant::now();
    let outcome = h
        .gateway
        .handle_callback(CallbackRequest {
            user_id: 42,
            chat_id: 42,
            message_id: None,
            data: format!("check_membership_{}", handle.id),
        })
        .await;

    assert_eq!(outcome, AccessOutcome::Delivered(handle.id));
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(h.delivery.sent().contains(&Sent::Notice(
        42,
        Notice::Verified {
            attempt: AttemptKind::Recheck
        }
    )));
}

#[tokio::test]
async fn test_misconfigured_channel_denies_everyone() {
    let h = harness(
        ScriptedMembership::new(vec![], Err(PlatformError::NoAccess("chat not found".into()))),
        RecordingDelivery::default(),
    );
    h.registry.register(MediaKind::Photo, "R1".into()).await;

    let outcome = h.gateway.handle_start(42, 42, "img1").await;

    assert!(matches!(outcome, AccessOutcome::Challenged(_)));
    assert_eq!(h.membership.lookups(), 1);

    let snapshot = h.gateway.diagnostics(42, false).await;
    assert_eq!(snapshot.misconfigured_lookups, 1);
    assert_eq!(snapshot.registry_size, 1);
}

#[tokio::test]
async fn test_diagnostics_live_check_and_clear() {
    let h = harness(
        ScriptedMembership::always(ChatMemberStatus::Restricted),
        RecordingDelivery::default(),
    );

    let snapshot = h.gateway.diagnostics(42, true).await;
    assert_eq!(
        snapshot.live_check.map(|c| c.status),
        Some(MembershipStatus::NotMember)
    );
    assert_eq!(snapshot.cache_size, 1);

    assert_eq!(h.gateway.clear_cache().await, 1);
    assert_eq!(h.cache.size().await, 0);
}

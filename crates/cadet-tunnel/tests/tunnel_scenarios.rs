//! Black-box scenario tests driving two in-memory [`Tunnel`]s over a fake
//! in-process connection, plus in-order delivery and the idle-destroy
//! arm/disarm behavior.
//!
//! KX framing is out of scope for this crate (see [`cadet_tunnel::KxEvent`]'s
//! docs), so these tests bootstrap both sides' ratchets directly from a
//! shared symmetric seed, the same way `cadet-crypto`'s own `paired_states`
//! test fixture does, rather than running a real handshake.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cadet_crypto::random::SecureRng;
use cadet_crypto::{AxolotlConfig, AxolotlState, DhKeyPair};
use cadet_tunnel::{
    ChannelFactory, ChannelHandle, ChannelRole, Connection, ConnectionId, InnerMessage, KxEvent, NullStats, PathCandidate,
    PathId, PathSource, Tunnel, TunnelConfig,
};

struct NoPaths;
impl PathSource for NoPaths {
    fn discover(&self, _destination: &[u8; 32]) -> Vec<Box<dyn PathCandidate>> {
        Vec::new()
    }
}

#[derive(Default)]
struct RecordingChannel {
    received: Mutex<Vec<InnerMessage>>,
}

impl ChannelHandle for RecordingChannel {
    fn deliver(&self, message: InnerMessage) {
        self.received.lock().unwrap().push(message);
    }
}

#[derive(Default)]
struct RecordingFactory {
    channels: Mutex<std::collections::HashMap<u32, Arc<RecordingChannel>>>,
}

impl RecordingFactory {
    fn channel_for(&self, channel_number: u32) -> Arc<RecordingChannel> {
        self.channels.lock().unwrap().get(&channel_number).unwrap().clone()
    }
}

impl ChannelFactory for RecordingFactory {
    fn build(&self, channel_number: u32) -> Arc<dyn ChannelHandle> {
        let channel = Arc::new(RecordingChannel::default());
        self.channels.lock().unwrap().insert(channel_number, channel.clone());
        channel
    }
}

/// A connection that appends every sent frame to a shared inbox instead
/// of transmitting it anywhere; the test drains the inbox into the peer
/// tunnel's `handle_encrypted` explicitly, keeping delivery order
/// deterministic without a background task.
struct LoopbackConnection {
    id: ConnectionId,
    ready: AtomicBool,
    inbox: Arc<Mutex<VecDeque<Vec<u8>>>>,
}

impl std::fmt::Debug for LoopbackConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackConnection").field("id", &self.id).finish()
    }
}

impl Connection for LoopbackConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
    fn send(&self, frame: &[u8]) -> cadet_tunnel::Result<()> {
        self.inbox.lock().unwrap().push_back(frame.to_vec());
        Ok(())
    }
}

/// Two ratchets that agree on a root key and cross-wired chain/header
/// keys, exactly as `cadet-crypto`'s own paired-state test fixture
/// builds them: Alice sends on chain "a" (which is Bob's receiving
/// chain) and vice versa.
fn paired_ratchets() -> (AxolotlState, AxolotlState) {
    let rk = [9u8; 32];
    let alice_dhrs = DhKeyPair::generate(SecureRng::new());
    let bob_dhrs = DhKeyPair::generate(SecureRng::new());
    let alice_pub = alice_dhrs.public();
    let bob_pub = bob_dhrs.public();

    let chain_a = [11u8; 32];
    let chain_b = [12u8; 32];
    let hk_a = [13u8; 32];
    let hk_b = [14u8; 32];

    let config = AxolotlConfig::default();

    let alice = AxolotlState::new(
        rk, chain_a, chain_b, hk_a, hk_b, [15u8; 32], [16u8; 32], alice_dhrs, Some(bob_pub), config, 0,
    );
    let bob = AxolotlState::new(
        rk, chain_b, chain_a, hk_b, hk_a, [16u8; 32], [15u8; 32], bob_dhrs, Some(alice_pub), config, 0,
    );
    (alice, bob)
}

async fn deliver_pending(inbox: &Arc<Mutex<VecDeque<Vec<u8>>>>, receiver: &Arc<Tunnel>, connection: ConnectionId) {
    loop {
        let frame = inbox.lock().unwrap().pop_front();
        match frame {
            Some(frame) => receiver.handle_encrypted(connection, &frame).await.unwrap(),
            None => break,
        }
    }
}

async fn alice_only_pair() -> (Arc<Tunnel>, Arc<Tunnel>, Arc<RecordingFactory>, Arc<Mutex<VecDeque<Vec<u8>>>>) {
    let (alice_ratchet, bob_ratchet) = paired_ratchets();
    let bob_factory = Arc::new(RecordingFactory::default());

    let alice = Tunnel::create(
        [1u8; 32],
        ChannelRole::Initiator,
        TunnelConfig::default(),
        Arc::new(NullStats),
        Arc::new(RecordingFactory::default()),
        &NoPaths,
    )
    .await;
    let bob = Tunnel::create(
        [2u8; 32],
        ChannelRole::Responder,
        TunnelConfig::default(),
        Arc::new(NullStats),
        bob_factory.clone() as Arc<dyn ChannelFactory>,
        &NoPaths,
    )
    .await;

    alice.handle_kx(KxEvent::Established(alice_ratchet)).await;
    bob.handle_kx(KxEvent::Established(bob_ratchet)).await;

    let inbox = Arc::new(Mutex::new(VecDeque::new()));
    let connection_id = ConnectionId(1);
    alice
        .handle_inbound_connection(
            Arc::new(LoopbackConnection {
                id: connection_id,
                ready: AtomicBool::new(true),
                inbox: inbox.clone(),
            }),
            PathId(1),
        )
        .await;

    (alice, bob, bob_factory, inbox)
}

#[tokio::test]
async fn s1_three_messages_arrive_in_order() {
    let (alice, bob, bob_factory, inbox) = alice_only_pair().await;
    let connection_id = ConnectionId(1);

    let alice_channel = Arc::new(RecordingChannel::default());
    let channel_number = alice.add_channel(alice_channel).await.unwrap();

    alice
        .send(InnerMessage::ChannelOpen { channel_number }, Box::new(|| {}))
        .await
        .unwrap();
    deliver_pending(&inbox, &bob, connection_id).await;

    for byte in [0x41u8, 0x42, 0x43] {
        alice
            .send(
                InnerMessage::ChannelAppData {
                    channel_number,
                    payload: vec![byte],
                },
                Box::new(|| {}),
            )
            .await
            .unwrap();
    }
    deliver_pending(&inbox, &bob, connection_id).await;

    let bob_channel = bob_factory.channel_for(channel_number);
    let received = bob_channel.received.lock().unwrap();
    let payloads: Vec<u8> = received
        .iter()
        .filter_map(|message| match message {
            InnerMessage::ChannelAppData { payload, .. } => Some(payload[0]),
            _ => None,
        })
        .collect();
    assert_eq!(payloads, vec![0x41, 0x42, 0x43]);
}

#[tokio::test]
async fn rekey_timer_moves_ok_to_rekey_and_back() {
    let (alice, _bob, _bob_factory, _inbox) = alice_only_pair().await;

    assert_eq!(alice.encryption_state().await, cadet_tunnel::EncryptionState::Ok);
    assert!(alice.begin_rekey().await);
    assert_eq!(alice.encryption_state().await, cadet_tunnel::EncryptionState::Rekey);

    // Only one rekey may be in flight: a second expiry while already
    // rekeying is a no-op.
    assert!(!alice.begin_rekey().await);

    alice.rekey_acknowledged().await;
    assert_eq!(alice.encryption_state().await, cadet_tunnel::EncryptionState::Ok);
}

#[tokio::test]
async fn s6_idle_destroy_arms_after_last_channel_removed() {
    let mut config = TunnelConfig::default();
    config.idle_destroy_delay = Duration::from_millis(20);

    let tunnel = Tunnel::create(
        [3u8; 32],
        ChannelRole::Initiator,
        config,
        Arc::new(NullStats),
        Arc::new(RecordingFactory::default()),
        &NoPaths,
    )
    .await;

    let mut numbers = Vec::new();
    for _ in 0..8 {
        let channel = Arc::new(RecordingChannel::default());
        numbers.push(tunnel.add_channel(channel).await.unwrap());
    }
    assert!(!tunnel.idle_destroy_due().await);

    for number in &numbers {
        tunnel.remove_channel(*number).await;
    }

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(tunnel.idle_destroy_due().await);
}

#[tokio::test]
async fn s6_opening_a_channel_during_the_wait_cancels_destruction() {
    let mut config = TunnelConfig::default();
    config.idle_destroy_delay = Duration::from_millis(40);

    let tunnel = Tunnel::create(
        [4u8; 32],
        ChannelRole::Initiator,
        config,
        Arc::new(NullStats),
        Arc::new(RecordingFactory::default()),
        &NoPaths,
    )
    .await;

    let first = Arc::new(RecordingChannel::default());
    let number = tunnel.add_channel(first).await.unwrap();
    tunnel.remove_channel(number).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = Arc::new(RecordingChannel::default());
    tunnel.add_channel(second).await.unwrap();

    tokio::time::sleep(Duration::from_millis(35)).await;
    assert!(!tunnel.idle_destroy_due().await);
}

// crates/remote-server/tests/control_service.rs
//
// End-to-end scenarios against a real listener on an ephemeral port.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use remote_core::{Chapter, MediaInfo, MediaTrack, Player, SimulatedPlayer, WindowGeometry, WindowState};
use remote_server::{Approver, ClientId, Config, ControlService, SessionObserver};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use uuid::Uuid;

const READ_TIMEOUT: Duration = Duration::from_secs(3);

// -----------------------------------------------------------------------------
// Harness
// -----------------------------------------------------------------------------

#[derive(Default)]
struct RecordingObserver {
    added: Mutex<Vec<ClientId>>,
    removed: Mutex<Vec<ClientId>>,
}

impl SessionObserver for RecordingObserver {
    fn session_added(&self, id: ClientId, _peer_identity: &str) {
        self.added.lock().push(id);
    }

    fn session_removed(&self, id: ClientId) {
        self.removed.lock().push(id);
    }
}

fn test_config(require_auth: bool) -> Config {
    Config {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        require_auth,
        position_interval_ms: 50,
        ..Config::default()
    }
}

async fn start_with(
    require_auth: bool,
    approver: impl Approver,
    player: SimulatedPlayer,
    observer: Arc<RecordingObserver>,
) -> ControlService {
    ControlService::start(
        test_config(require_auth),
        Box::new(player),
        Arc::new(approver),
        observer,
    )
    .await
    .expect("service should start")
}

async fn start_open(player: SimulatedPlayer) -> ControlService {
    start_with(false, |_: &str| false, player, Arc::new(RecordingObserver::default())).await
}

fn movie_player() -> SimulatedPlayer {
    SimulatedPlayer::new().with_media(
        "movie.mkv",
        MediaInfo {
            duration: 60_000_000,
            chapters: vec![Chapter::new("Opening", 0), Chapter::new("Ending", 50_000_000)],
            subtitle_tracks: vec![MediaTrack::new("English", "SRT"), MediaTrack::new("German", "SRT")],
            audio_tracks: vec![MediaTrack::new("Stereo", "AAC")],
        },
    )
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect_silent(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn connect(addr: SocketAddr, identity: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (read_half, writer) = stream.into_split();
        let mut client = TestClient {
            lines: BufReader::new(read_half).lines(),
            writer,
        };
        client.send(identity).await;
        client
    }

    /// Connect to a server that lets `identity` in without a prompt.
    async fn authorized(addr: SocketAddr, identity: &str) -> (Self, ClientId) {
        let mut client = TestClient::connect(addr, identity).await;
        assert_eq!(client.recv().await.as_deref(), Some("Connected|Authorized"));
        let id = client.recv_client_guid().await;
        (client, id)
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{}\n", line).as_bytes())
            .await
            .expect("write");
    }

    /// Next line, or `None` once the server has closed the connection.
    async fn recv(&mut self) -> Option<String> {
        timeout(READ_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }

    /// Read until a line satisfies `pred`, returning that line.
    async fn recv_until(&mut self, pred: impl Fn(&str) -> bool) -> String {
        loop {
            match self.recv().await {
                Some(line) if pred(&line) => return line,
                Some(_) => continue,
                None => panic!("connection closed before the expected line"),
            }
        }
    }

    async fn expect_line(&mut self, expected: &str) {
        self.recv_until(|l| l == expected).await;
    }

    async fn recv_client_guid(&mut self) -> ClientId {
        let line = self.recv().await.expect("ClientGUID line");
        let guid = line
            .strip_prefix("ClientGUID|")
            .unwrap_or_else(|| panic!("expected ClientGUID, got {line:?}"));
        ClientId(Uuid::parse_str(guid).expect("valid guid"))
    }

    /// Skip whatever is still queued and wait for the server to close.
    async fn expect_closed(&mut self) {
        while self.recv().await.is_some() {}
    }

    /// Round-trip a `GetDuration` so every earlier command has been
    /// processed by the server.
    async fn barrier(&mut self) {
        self.send("GetDuration").await;
        self.recv_until(|l| l.starts_with("FullLength|")).await;
    }
}

async fn client_ids(service: &ControlService) -> Vec<ClientId> {
    service.clients().await.into_iter().map(|c| c.id).collect()
}

async fn eventually(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

// -----------------------------------------------------------------------------
// Handshake
// -----------------------------------------------------------------------------

#[tokio::test]
async fn authorizes_immediately_when_auth_is_disabled() {
    let service = start_open(SimulatedPlayer::new()).await;

    let mut client = TestClient::connect(service.local_addr(), "phone").await;
    assert_eq!(client.recv().await.as_deref(), Some("Connected|Authorized"));
    let id = client.recv_client_guid().await;

    client.barrier().await;
    let clients = service.clients().await;
    assert_eq!(clients.len(), 1);
    assert_eq!(clients[0].id, id);
    assert_eq!(clients[0].peer_identity, "phone");

    service.shutdown().await;
}

#[tokio::test]
async fn auth_code_is_sent_before_the_decision_and_approval_is_remembered() {
    let (decide_tx, decide_rx) = std_mpsc::channel::<bool>();
    let decide_rx = std::sync::Mutex::new(decide_rx);
    let asked = Arc::new(AtomicUsize::new(0));
    let asked_in_approver = asked.clone();
    let approver = move |_: &str| {
        asked_in_approver.fetch_add(1, Ordering::SeqCst);
        decide_rx
            .lock()
            .map(|rx| rx.recv_timeout(Duration::from_secs(5)).unwrap_or(false))
            .unwrap_or(false)
    };

    let service = start_with(true, approver, SimulatedPlayer::new(), Arc::new(RecordingObserver::default())).await;
    let addr = service.local_addr();

    let mut first = TestClient::connect(addr, "tablet-1234").await;
    assert_eq!(first.recv().await.as_deref(), Some("AuthCode|tablet-1234"));
    decide_tx.send(true).unwrap();
    assert_eq!(first.recv().await.as_deref(), Some("Connected|Authorized"));
    first.recv_client_guid().await;
    assert_eq!(asked.load(Ordering::SeqCst), 1);

    // Same identity string again: no prompt, no AuthCode.
    let (mut second, _) = TestClient::authorized(addr, "tablet-1234").await;
    second.barrier().await;
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    assert_eq!(service.clients().await.len(), 2);

    service.shutdown().await;
}

#[tokio::test]
async fn denied_peer_gets_exit_and_never_receives_broadcasts() {
    let observer = Arc::new(RecordingObserver::default());
    let approver = |identity: &str| identity == "trusted";
    let service = start_with(true, approver, SimulatedPlayer::new(), observer.clone()).await;
    let addr = service.local_addr();

    let mut trusted = TestClient::connect(addr, "trusted").await;
    assert_eq!(trusted.recv().await.as_deref(), Some("AuthCode|trusted"));
    assert_eq!(trusted.recv().await.as_deref(), Some("Connected|Authorized"));
    let trusted_id = trusted.recv_client_guid().await;

    let mut intruder = TestClient::connect(addr, "intruder").await;
    assert_eq!(intruder.recv().await.as_deref(), Some("AuthCode|intruder"));
    assert_eq!(intruder.recv().await.as_deref(), Some("Exit|Unauthorized"));
    assert_eq!(intruder.recv().await, None);

    trusted.send("Volume|20").await;
    trusted.expect_line("Volume|20").await;
    trusted.barrier().await;

    assert_eq!(client_ids(&service).await, vec![trusted_id]);
    assert_eq!(observer.added.lock().clone(), vec![trusted_id]);

    service.shutdown().await;
}

#[tokio::test]
async fn client_identities_are_unique() {
    let service = start_open(SimulatedPlayer::new()).await;
    let addr = service.local_addr();

    let mut ids = HashSet::new();
    let mut clients = Vec::new();
    for i in 0..5 {
        let (client, id) = TestClient::authorized(addr, &format!("device-{i}")).await;
        ids.insert(id);
        clients.push(client);
    }
    assert_eq!(ids.len(), 5);

    service.shutdown().await;
}

// -----------------------------------------------------------------------------
// Commands
// -----------------------------------------------------------------------------

#[tokio::test]
async fn volume_and_mute_reach_every_client() {
    let service = start_open(SimulatedPlayer::new()).await;
    let addr = service.local_addr();

    let (mut a, _) = TestClient::authorized(addr, "a").await;
    let (mut b, _) = TestClient::authorized(addr, "b").await;
    a.barrier().await;
    b.barrier().await;

    a.send("Volume|50").await;
    a.expect_line("Volume|50").await;
    b.expect_line("Volume|50").await;

    a.send("Mute|true").await;
    a.expect_line("Mute|True").await;
    b.expect_line("Mute|True").await;

    service.shutdown().await;
}

#[tokio::test]
async fn current_state_without_media_omits_duration_and_position() {
    let service = start_open(SimulatedPlayer::new()).await;
    let (mut client, id) = TestClient::authorized(service.local_addr(), "phone").await;

    client.send(&format!("GetCurrentState|{}", id)).await;
    let mut reply = Vec::new();
    for _ in 0..7 {
        reply.push(client.recv().await.expect("state line"));
    }
    assert_eq!(
        reply,
        vec![
            "Chapters|",
            "Closed|",
            "Fullscreen|False",
            "Mute|False",
            "Volume|100",
            "Subtitles|",
            "AudioTracks|",
        ]
    );

    service.shutdown().await;
}

#[tokio::test]
async fn current_state_reply_goes_only_to_the_requester() {
    let service = start_open(SimulatedPlayer::new()).await;
    let addr = service.local_addr();
    let (mut a, _) = TestClient::authorized(addr, "a").await;
    let (mut b, _) = TestClient::authorized(addr, "b").await;

    a.send("GetCurrentState").await;
    a.expect_line("AudioTracks|").await;

    // b's next line is its own reply, not a's snapshot.
    b.send("GetDuration").await;
    assert_eq!(b.recv().await.as_deref(), Some("FullLength|0"));

    service.shutdown().await;
}

#[tokio::test]
async fn playing_broadcasts_lists_state_and_position() {
    let service = start_open(movie_player()).await;
    let addr = service.local_addr();
    let (mut a, _) = TestClient::authorized(addr, "a").await;
    let (mut b, _) = TestClient::authorized(addr, "b").await;
    b.barrier().await;

    a.send("Open|movie.mkv").await;
    for client in [&mut a, &mut b] {
        client
            .expect_line("Chapters|1>>Opening>>0]]2>>Ending>>50000000")
            .await;
        assert_eq!(
            client.recv().await.as_deref(),
            Some("Subtitles|1>>English>>SRT>>True]]2>>German>>SRT>>False")
        );
        assert_eq!(
            client.recv().await.as_deref(),
            Some("AudioTracks|1>>Stereo>>AAC>>True")
        );
        client.expect_line("Playing|movie.mkv").await;
        client.recv_until(|l| l.starts_with("Position|")).await;
    }

    a.send("ActiveSubTrack|German").await;
    b.expect_line("SubChanged|German").await;

    a.send("Stop").await;
    b.expect_line("Stopped|movie.mkv").await;

    service.shutdown().await;
}

#[tokio::test]
async fn unparsable_seek_leaves_position_unchanged() {
    let player = movie_player();
    let service = start_open(player.clone()).await;
    let (mut client, _) = TestClient::authorized(service.local_addr(), "phone").await;

    client.send("Open|movie.mkv").await;
    client.expect_line("Playing|movie.mkv").await;
    client.send("Pause|False").await;
    client.expect_line("Paused|movie.mkv").await;

    client.send("Seek|5000000").await;
    client.barrier().await;
    assert_eq!(player.position(), Ok(5_000_000));

    client.send("Seek|abc").await;
    client.barrier().await;
    assert_eq!(player.position(), Ok(5_000_000));

    service.shutdown().await;
}

#[tokio::test]
async fn move_window_is_all_or_nothing() {
    let player = SimulatedPlayer::new();
    let service = start_open(player.clone()).await;
    let (mut client, _) = TestClient::authorized(service.local_addr(), "phone").await;

    client.send("MoveWindow|10|20|bad|300|Maximized").await;
    client.barrier().await;
    assert_eq!(player.geometry(), WindowGeometry::default());
    assert_eq!(player.window_state(), WindowState::Normal);

    client.send("MoveWindow|10|20|640|480|Maximized").await;
    client.send("Borderless").await;
    client.barrier().await;
    assert_eq!(
        player.geometry(),
        WindowGeometry {
            left: 10,
            top: 20,
            width: 640,
            height: 480
        }
    );
    assert_eq!(player.window_state(), WindowState::Maximized);
    assert!(player.is_borderless());

    service.shutdown().await;
}

#[tokio::test]
async fn malformed_lines_do_not_disconnect() {
    let player = SimulatedPlayer::new();
    let service = start_open(player.clone()).await;
    let (mut client, _) = TestClient::authorized(service.local_addr(), "phone").await;

    for line in ["", "Rewind|5", "Volume|loud", "Mute|perhaps", "Open", "ActiveAudioTrack|Nope"] {
        client.send(line).await;
    }
    client.send("WriteToScreen|Hello there").await;
    client.barrier().await;

    assert_eq!(player.volume(), 100);
    assert!(!player.is_muted());
    assert!(
        eventually(|| player.osd_messages().iter().any(|m| m == "Hello there")).await
    );
    assert_eq!(service.clients().await.len(), 1);

    service.shutdown().await;
}

// -----------------------------------------------------------------------------
// Teardown
// -----------------------------------------------------------------------------

#[tokio::test]
async fn exit_closes_only_that_session() {
    let player = SimulatedPlayer::new();
    let observer = Arc::new(RecordingObserver::default());
    let service = start_with(false, |_: &str| false, player.clone(), observer.clone()).await;
    let addr = service.local_addr();

    let (mut a, a_id) = TestClient::authorized(addr, "a").await;
    let (mut b, b_id) = TestClient::authorized(addr, "b").await;
    b.barrier().await;

    b.send("Exit").await;
    b.expect_closed().await;

    a.send("Volume|30").await;
    a.expect_line("Volume|30").await;
    assert_eq!(client_ids(&service).await, vec![a_id]);
    assert_eq!(observer.removed.lock().clone(), vec![b_id]);
    assert!(
        eventually(|| player.osd_messages().iter().any(|m| m == "Remote Disconnected")).await
    );
    assert!(player.osd_messages().iter().any(|m| m == "Remote Connected"));

    service.shutdown().await;
}

#[tokio::test]
async fn peer_hangup_removes_the_session() {
    let observer = Arc::new(RecordingObserver::default());
    let service = start_with(false, |_: &str| false, SimulatedPlayer::new(), observer.clone()).await;

    let (mut client, id) = TestClient::authorized(service.local_addr(), "phone").await;
    client.barrier().await;
    drop(client);

    let removed = observer.clone();
    assert!(eventually(move || removed.removed.lock().contains(&id)).await);
    assert!(service.clients().await.is_empty());
    assert_eq!(observer.removed.lock().len(), 1);

    service.shutdown().await;
}

#[tokio::test]
async fn operator_disconnect_is_idempotent() {
    let observer = Arc::new(RecordingObserver::default());
    let service = start_with(false, |_: &str| false, SimulatedPlayer::new(), observer.clone()).await;
    let (mut client, id) = TestClient::authorized(service.local_addr(), "phone").await;
    client.barrier().await;

    assert!(service.disconnect(id).await);
    assert_eq!(client.recv().await.as_deref(), Some("Exit|Disconnected by User"));
    assert_eq!(client.recv().await, None);

    assert!(!service.disconnect(id).await);
    assert_eq!(observer.removed.lock().clone(), vec![id]);

    service.shutdown().await;
}

#[tokio::test]
async fn shutdown_says_goodbye_to_every_client() {
    let service = start_open(SimulatedPlayer::new()).await;
    let addr = service.local_addr();
    let (mut a, _) = TestClient::authorized(addr, "a").await;
    let (mut b, _) = TestClient::authorized(addr, "b").await;
    a.barrier().await;
    b.barrier().await;

    service.shutdown().await;

    for client in [&mut a, &mut b] {
        client.expect_line("Closing|Close").await;
        assert_eq!(client.recv().await, None);
    }

    // The listener is gone too.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn invalid_utf8_does_not_disconnect() {
    let player = movie_player();
    let service = start_open(player.clone()).await;
    let (mut client, _) = TestClient::authorized(service.local_addr(), "phone").await;

    client.send_raw(b"Open|caf\xe9.mkv\n").await;
    client.send_raw(b"Volume|40\r\n").await;
    client.expect_line("Volume|40").await;
    client.barrier().await;

    assert_eq!(service.clients().await.len(), 1);
    assert_eq!(player.volume(), 40);

    service.shutdown().await;
}

#[tokio::test]
async fn exit_for_an_unknown_client_changes_nothing() {
    let player = SimulatedPlayer::new();
    let service = start_open(player.clone()).await;
    let (mut client, id) = TestClient::authorized(service.local_addr(), "phone").await;
    client.barrier().await;

    client.send(&format!("Exit|{}", Uuid::new_v4())).await;
    client.barrier().await;

    assert_eq!(client_ids(&service).await, vec![id]);
    assert!(!player.osd_messages().iter().any(|m| m == "Remote Disconnected"));

    service.shutdown().await;
}

#[tokio::test]
async fn shutdown_does_not_wait_for_a_silent_peer() {
    let service = start_open(SimulatedPlayer::new()).await;
    let mut silent = TestClient::connect_silent(service.local_addr()).await;

    // Let the server accept it.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    service.shutdown().await;
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "shutdown took {:?}",
        started.elapsed()
    );

    silent.expect_closed().await;
}

#[tokio::test]
async fn shutdown_does_not_wait_for_a_pending_approval() {
    let (decide_tx, decide_rx) = std_mpsc::channel::<bool>();
    let decide_rx = std::sync::Mutex::new(decide_rx);
    let approver = move |_: &str| {
        decide_rx
            .lock()
            .map(|rx| rx.recv_timeout(Duration::from_secs(5)).unwrap_or(false))
            .unwrap_or(false)
    };
    let service = start_with(true, approver, SimulatedPlayer::new(), Arc::new(RecordingObserver::default())).await;

    let mut pending = TestClient::connect(service.local_addr(), "tablet").await;
    assert_eq!(pending.recv().await.as_deref(), Some("AuthCode|tablet"));

    let started = Instant::now();
    service.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(1));

    assert_eq!(pending.recv().await.as_deref(), Some("Closing|Close"));
    assert_eq!(pending.recv().await, None);

    // Releases the approver thread still waiting for a decision.
    drop(decide_tx);
}

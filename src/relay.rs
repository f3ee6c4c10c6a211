// src/relay.rs
//
// Bidirectional terminal relay.
// Two pumps run on their own threads: inbound copies serial bytes to the local
// terminal, outbound turns local input into frames for the serial link. The
// first pump to finish ends the session for both.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crate::ansi::{encode, normalize, raw_character, OutputFrame};
use crate::io::console::{InputSource, LocalInput, LocalOutput};
use crate::io::serial::SerialTransport;
use crate::keys::KeyEvent;

/// How long `run` waits for the second pump after the session has ended.
pub const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

const INBOUND_CHUNK: usize = 4096;

// ============================================================================
// Types and Configuration
// ============================================================================

/// Flags the relay reads from the configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// Translate named keys to escape sequences
    pub ansi: bool,
    /// Echo outbound frames to the local terminal
    pub echo: bool,
    /// Send CR LF for the Enter key
    pub crlf: bool,
}

/// One direction of the relay
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pump {
    Inbound,
    Outbound,
}

impl fmt::Display for Pump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pump::Inbound => write!(f, "inbound"),
            Pump::Outbound => write!(f, "outbound"),
        }
    }
}

/// Why a session ended. None of these are failures of the program itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// Serial read returned no data or the transport was closed
    RemoteClosed,
    /// Serial read or write failed (e.g. device unplugged)
    TransportError(String),
    /// stdin reached EOF or the exit key was pressed
    LocalEof,
    /// Reading local input failed
    InputError(String),
    /// A pump stopped without reporting a reason
    PumpStopped(Pump),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::RemoteClosed => write!(f, "serial port closed"),
            EndReason::TransportError(e) => write!(f, "serial I/O error: {}", e),
            EndReason::LocalEof => write!(f, "local input ended"),
            EndReason::InputError(e) => write!(f, "local input error: {}", e),
            EndReason::PumpStopped(p) => write!(f, "{} pump stopped", p),
        }
    }
}

// ============================================================================
// Session Signal
// ============================================================================

struct SignalInner {
    ended: AtomicBool,
    reason: Mutex<Option<EndReason>>,
    cvar: Condvar,
}

/// "Session ended" flag shared by both pumps. Set at most once; the first
/// caller of [`SessionSignal::end`] decides the reason.
#[derive(Clone)]
pub struct SessionSignal {
    inner: Arc<SignalInner>,
}

impl SessionSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                ended: AtomicBool::new(false),
                reason: Mutex::new(None),
                cvar: Condvar::new(),
            }),
        }
    }

    /// End the session. Returns `false` if it had already ended.
    pub fn end(&self, reason: EndReason) -> bool {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.ended.store(true, Ordering::SeqCst);
        self.inner.cvar.notify_all();
        true
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    pub fn reason(&self) -> Option<EndReason> {
        self.inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block until the session ends.
    pub fn wait(&self) -> EndReason {
        let mut slot = self
            .inner
            .reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(reason) = slot.as_ref() {
                return reason.clone();
            }
            slot = self
                .inner
                .cvar
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Relay Session
// ============================================================================

#[derive(Default)]
struct RelayStats {
    bytes_in: AtomicU64,
    bytes_out: AtomicU64,
}

/// Live state of one connection.
pub struct RelaySession {
    transport: Arc<dyn SerialTransport>,
    options: RelayOptions,
    signal: SessionSignal,
    stats: Arc<RelayStats>,
}

impl RelaySession {
    pub fn new(transport: Arc<dyn SerialTransport>, options: RelayOptions) -> Self {
        Self {
            transport,
            options,
            signal: SessionSignal::new(),
            stats: Arc::new(RelayStats::default()),
        }
    }
}

/// Outcome of [`run`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSummary {
    pub reason: EndReason,
    /// Bytes received from the serial link
    pub bytes_in: u64,
    /// Bytes sent to the serial link
    pub bytes_out: u64,
    /// Pumps still blocked when `run` returned
    pub stragglers: Vec<Pump>,
}

// ============================================================================
// Frames
// ============================================================================

/// Bytes sent for one key press under the given options.
pub fn frame_for_key(event: &KeyEvent, options: RelayOptions) -> OutputFrame {
    let frame = if options.ansi {
        encode(event)
    } else {
        raw_character(event)
    };
    normalize(frame, event, options.crlf)
}

/// Write an outbound frame to the local terminal when echo is on.
/// Failures are logged and otherwise ignored.
pub fn echo(output: &LocalOutput, frame: &[u8], enabled: bool) {
    if !enabled || frame.is_empty() {
        return;
    }
    if let Err(e) = output.write_frame(frame) {
        tlog!("[relay] Local echo failed: {}", e);
    }
}

fn is_retry(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ============================================================================
// Pumps
// ============================================================================

/// Reports the pump as finished when dropped, including on panic.
struct PumpExit {
    pump: Pump,
    signal: SessionSignal,
    done_tx: std_mpsc::Sender<Pump>,
}

impl Drop for PumpExit {
    fn drop(&mut self) {
        if self.signal.end(EndReason::PumpStopped(self.pump)) {
            tlog!("[relay] {} pump stopped without a reason", self.pump);
        }
        let _ = self.done_tx.send(self.pump);
    }
}

/// Serial -> local terminal
fn inbound_pump(
    transport: Arc<dyn SerialTransport>,
    output: LocalOutput,
    signal: SessionSignal,
    stats: Arc<RelayStats>,
) {
    let mut buf = [0u8; INBOUND_CHUNK];

    while !signal.is_ended() {
        if !transport.is_open() {
            signal.end(EndReason::RemoteClosed);
            break;
        }

        match transport.read(&mut buf) {
            Ok(0) => {
                signal.end(EndReason::RemoteClosed);
                break;
            }
            Ok(n) => {
                stats.bytes_in.fetch_add(n as u64, Ordering::Relaxed);
                if let Err(e) = output.write_frame(&buf[..n]) {
                    tlog!("[relay] Failed to write {} bytes to terminal: {}", n, e);
                }
            }
            Err(ref e) if is_retry(e) => {
                // Nothing arrived, check the signal and read again
            }
            Err(e) => {
                signal.end(EndReason::TransportError(e.to_string()));
                break;
            }
        }
    }
}

/// Local input -> serial
fn outbound_pump(
    transport: Arc<dyn SerialTransport>,
    mut input: impl InputSource,
    output: LocalOutput,
    options: RelayOptions,
    signal: SessionSignal,
    stats: Arc<RelayStats>,
) {
    while !signal.is_ended() {
        if !transport.is_open() {
            signal.end(EndReason::RemoteClosed);
            break;
        }

        let frame = match input.next_input() {
            Ok(LocalInput::Key(event)) => frame_for_key(&event, options),
            // Redirected input is forwarded exactly as read
            Ok(LocalInput::Bytes(bytes)) => bytes,
            Ok(LocalInput::Idle) => continue,
            Ok(LocalInput::Eof) => {
                signal.end(EndReason::LocalEof);
                break;
            }
            Err(ref e) if is_retry(e) => continue,
            Err(e) => {
                signal.end(EndReason::InputError(e.to_string()));
                break;
            }
        };

        if frame.is_empty() {
            continue;
        }
        if signal.is_ended() {
            break;
        }

        tlog!("[relay] tx {}", hex::encode(&frame));

        if let Err(e) = transport.write(&frame) {
            signal.end(EndReason::TransportError(e.to_string()));
            break;
        }
        stats
            .bytes_out
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        echo(&output, &frame, options.echo);
    }
}

// ============================================================================
// Run
// ============================================================================

/// Run both pumps until the session ends, then close the transport.
///
/// Blocks the caller. Returns once the session has ended and the second pump
/// has stopped or [`SHUTDOWN_GRACE`] has passed. A pump still blocked after
/// that (e.g. in a redirected stdin read) is left behind and listed in
/// [`SessionSummary::stragglers`].
pub fn run<I>(session: RelaySession, input: I, output: LocalOutput) -> Result<SessionSummary, String>
where
    I: InputSource + 'static,
{
    let RelaySession {
        transport,
        options,
        signal,
        stats,
    } = session;

    tlog!(
        "[relay] Starting session (ansi: {}, echo: {}, crlf: {})",
        options.ansi,
        options.echo,
        options.crlf
    );

    let (done_tx, done_rx) = std_mpsc::channel::<Pump>();

    let inbound = {
        let transport = transport.clone();
        let output = output.clone();
        let signal = signal.clone();
        let stats = stats.clone();
        let exit = PumpExit {
            pump: Pump::Inbound,
            signal: signal.clone(),
            done_tx: done_tx.clone(),
        };
        thread::Builder::new()
            .name("relay-inbound".to_string())
            .spawn(move || {
                let _exit = exit;
                inbound_pump(transport, output, signal, stats);
            })
            .map_err(|e| format!("Failed to spawn inbound pump: {}", e))?
    };

    let outbound = {
        let transport_for_pump = transport.clone();
        let output = output.clone();
        let signal_for_pump = signal.clone();
        let stats = stats.clone();
        let exit = PumpExit {
            pump: Pump::Outbound,
            signal: signal.clone(),
            done_tx,
        };
        let spawned = thread::Builder::new()
            .name("relay-outbound".to_string())
            .spawn(move || {
                let _exit = exit;
                outbound_pump(transport_for_pump, input, output, options, signal_for_pump, stats);
            });
        match spawned {
            Ok(handle) => handle,
            Err(e) => {
                // Stop the inbound pump before reporting
                signal.end(EndReason::PumpStopped(Pump::Outbound));
                transport.close();
                let _ = inbound.join();
                return Err(format!("Failed to spawn outbound pump: {}", e));
            }
        }
    };

    let reason = signal.wait();
    tlog!("[relay] Session ending: {}", reason);
    transport.close();

    let mut pending = vec![Pump::Inbound, Pump::Outbound];
    let mut handles = vec![(Pump::Inbound, inbound), (Pump::Outbound, outbound)];
    while !pending.is_empty() {
        match done_rx.recv_timeout(SHUTDOWN_GRACE) {
            Ok(pump) => {
                pending.retain(|p| *p != pump);
                if let Some(pos) = handles.iter().position(|(p, _)| *p == pump) {
                    let (_, handle) = handles.swap_remove(pos);
                    if handle.join().is_err() {
                        tlog!("[relay] {} pump panicked", pump);
                    }
                }
            }
            Err(_) => {
                tlog!("[relay] Leaving {:?} pump(s) blocked", pending);
                break;
            }
        }
    }

    let summary = SessionSummary {
        reason,
        bytes_in: stats.bytes_in.load(Ordering::Relaxed),
        bytes_out: stats.bytes_out.load(Ordering::Relaxed),
        stragglers: pending,
    };

    tlog!(
        "[relay] Session ended: {} (rx {} bytes, tx {} bytes)",
        summary.reason,
        summary.bytes_in,
        summary.bytes_out
    );

    Ok(summary)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Modifiers, NamedKey};
    use std::collections::VecDeque;
    use std::io::Write;
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(5);

    /// In-memory serial link. Chunks in `incoming` are handed out one per read;
    /// once drained the link either idles (`hold_open`) or reports EOF.
    struct MockTransport {
        incoming: Mutex<VecDeque<Vec<u8>>>,
        written: Mutex<Vec<u8>>,
        open: AtomicBool,
        hold_open: bool,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl MockTransport {
        fn new(incoming: &[&[u8]], hold_open: bool) -> Arc<Self> {
            Arc::new(Self {
                incoming: Mutex::new(incoming.iter().map(|c| c.to_vec()).collect()),
                written: Mutex::new(Vec::new()),
                open: AtomicBool::new(true),
                hold_open,
                fail_reads: false,
                fail_writes: false,
            })
        }

        fn failing(fail_reads: bool, fail_writes: bool) -> Arc<Self> {
            Arc::new(Self {
                incoming: Mutex::new(VecDeque::new()),
                written: Mutex::new(Vec::new()),
                open: AtomicBool::new(true),
                hold_open: true,
                fail_reads,
                fail_writes,
            })
        }

        fn written(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }

    impl SerialTransport for MockTransport {
        fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
            if !self.is_open() {
                return Ok(0);
            }
            if self.fail_reads {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            if let Some(chunk) = self.incoming.lock().unwrap().pop_front() {
                buf[..chunk.len()].copy_from_slice(&chunk);
                return Ok(chunk.len());
            }
            if self.hold_open {
                thread::sleep(TICK);
                return Err(io::Error::new(io::ErrorKind::TimedOut, "idle"));
            }
            Ok(0)
        }

        fn write(&self, bytes: &[u8]) -> io::Result<()> {
            if self.fail_writes {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
            }
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn close(&self) {
            self.open.store(false, Ordering::SeqCst);
        }
    }

    /// Plays back a fixed list of inputs, then idles forever or reports EOF.
    struct ScriptedInput {
        script: VecDeque<LocalInput>,
        eof_when_done: bool,
    }

    impl ScriptedInput {
        fn new(script: Vec<LocalInput>, eof_when_done: bool) -> Self {
            Self {
                script: script.into(),
                eof_when_done,
            }
        }
    }

    impl InputSource for ScriptedInput {
        fn next_input(&mut self) -> io::Result<LocalInput> {
            if let Some(next) = self.script.pop_front() {
                return Ok(next);
            }
            if self.eof_when_done {
                return Ok(LocalInput::Eof);
            }
            thread::sleep(TICK);
            Ok(LocalInput::Idle)
        }
    }

    struct PanickingInput;

    impl InputSource for PanickingInput {
        fn next_input(&mut self) -> io::Result<LocalInput> {
            panic!("keyboard on fire");
        }
    }

    /// Never returns, like a read on a redirected stdin that stays open.
    struct StuckInput;

    impl InputSource for StuckInput {
        fn next_input(&mut self) -> io::Result<LocalInput> {
            loop {
                thread::park();
            }
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenOutput;

    impl Write for BrokenOutput {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "tty gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn key(c: char) -> LocalInput {
        LocalInput::Key(KeyEvent::char(c))
    }

    fn named(k: NamedKey) -> LocalInput {
        LocalInput::Key(KeyEvent::named(k))
    }

    fn enter() -> LocalInput {
        LocalInput::Key(KeyEvent::char('\r').with_named_key(NamedKey::Enter))
    }

    fn options(ansi: bool, echo: bool, crlf: bool) -> RelayOptions {
        RelayOptions { ansi, echo, crlf }
    }

    fn run_with(
        transport: Arc<MockTransport>,
        input: impl InputSource + 'static,
        opts: RelayOptions,
    ) -> (SessionSummary, Vec<u8>) {
        let out = SharedBuf::default();
        let session = RelaySession::new(transport, opts);
        let summary = run(session, input, LocalOutput::new(out.clone())).unwrap();
        (summary, out.contents())
    }

    #[test]
    fn test_signal_first_end_wins() {
        let signal = SessionSignal::new();
        assert!(!signal.is_ended());
        assert_eq!(signal.reason(), None);
        assert!(signal.end(EndReason::RemoteClosed));
        assert!(!signal.end(EndReason::LocalEof));
        assert!(signal.is_ended());
        assert_eq!(signal.reason(), Some(EndReason::RemoteClosed));
        assert_eq!(signal.wait(), EndReason::RemoteClosed);
    }

    #[test]
    fn test_signal_wakes_waiter() {
        let signal = SessionSignal::new();
        let setter = signal.clone();
        let handle = thread::spawn(move || {
            thread::sleep(TICK);
            setter.end(EndReason::LocalEof)
        });
        assert_eq!(signal.wait(), EndReason::LocalEof);
        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_frame_for_key() {
        let up = KeyEvent::named(NamedKey::UpArrow);
        assert_eq!(frame_for_key(&up, options(true, false, false)), b"\x1b[A");
        assert!(frame_for_key(&up, options(false, false, false)).is_empty());

        let ctrl_up = up.with_modifiers(Modifiers::CONTROL);
        assert_eq!(frame_for_key(&ctrl_up, options(true, false, false)), b"\x1b[1;5A");

        let enter = KeyEvent::char('\r').with_named_key(NamedKey::Enter);
        assert_eq!(frame_for_key(&enter, options(false, false, true)), b"\r\n");
        assert_eq!(frame_for_key(&enter, options(true, false, true)), b"\r\n");
        assert_eq!(frame_for_key(&enter, options(false, false, false)), b"\r");

        let f1 = KeyEvent::named(NamedKey::F1);
        assert_eq!(frame_for_key(&f1, options(true, false, false)), b"OP");
    }

    #[test]
    fn test_echo_writes_only_when_enabled() {
        let buf = SharedBuf::default();
        let out = LocalOutput::new(buf.clone());
        echo(&out, b"x", false);
        assert!(buf.contents().is_empty());
        echo(&out, b"xy", true);
        assert_eq!(buf.contents(), b"xy");
    }

    #[test]
    fn test_echo_failure_is_ignored() {
        let out = LocalOutput::new(BrokenOutput);
        echo(&out, b"x", true);
    }

    #[test]
    fn test_remote_eof_ends_session() {
        let transport = MockTransport::new(&[b"hello ", b"world"], false);
        let input = ScriptedInput::new(vec![], false);
        let (summary, out) = run_with(transport.clone(), input, options(true, false, false));

        assert_eq!(summary.reason, EndReason::RemoteClosed);
        assert!(summary.stragglers.is_empty());
        assert_eq!(summary.bytes_in, 11);
        assert_eq!(out, b"hello world");
        assert!(!transport.is_open());
    }

    #[test]
    fn test_local_eof_ends_session() {
        let transport = MockTransport::new(&[], true);
        let input = ScriptedInput::new(vec![key('a'), named(NamedKey::UpArrow)], true);
        let (summary, _) = run_with(transport.clone(), input, options(true, false, false));

        assert_eq!(summary.reason, EndReason::LocalEof);
        assert!(summary.stragglers.is_empty());
        assert_eq!(transport.written(), b"a\x1b[A");
        assert_eq!(summary.bytes_out, 4);
        assert!(!transport.is_open());
    }

    #[test]
    fn test_plain_mode_drops_named_keys() {
        let transport = MockTransport::new(&[], true);
        let input = ScriptedInput::new(
            vec![named(NamedKey::UpArrow), key('b'), named(NamedKey::F5)],
            true,
        );
        run_with(transport.clone(), input, options(false, false, false));
        assert_eq!(transport.written(), b"b");
    }

    #[test]
    fn test_crlf_after_enter() {
        let transport = MockTransport::new(&[], true);
        let input = ScriptedInput::new(vec![key('o'), key('k'), enter()], true);
        run_with(transport.clone(), input, options(false, false, true));
        assert_eq!(transport.written(), b"ok\r\n");
    }

    #[test]
    fn test_redirected_bytes_are_forwarded_verbatim() {
        let transport = MockTransport::new(&[], true);
        let input = ScriptedInput::new(vec![LocalInput::Bytes(b"AT\r\x1b[A".to_vec())], true);
        run_with(transport.clone(), input, options(true, false, true));
        assert_eq!(transport.written(), b"AT\r\x1b[A");
    }

    #[test]
    fn test_echo_does_not_change_transport_bytes() {
        let script = || vec![key('h'), named(NamedKey::LeftArrow), enter()];

        let quiet = MockTransport::new(&[], true);
        let (_, quiet_out) =
            run_with(quiet.clone(), ScriptedInput::new(script(), true), options(true, false, true));

        let loud = MockTransport::new(&[], true);
        let (_, loud_out) =
            run_with(loud.clone(), ScriptedInput::new(script(), true), options(true, true, true));

        assert_eq!(quiet.written(), loud.written());
        assert!(quiet_out.is_empty());
        assert_eq!(loud_out, loud.written());
    }

    #[test]
    fn test_write_failure_ends_session() {
        let transport = MockTransport::failing(false, true);
        let input = ScriptedInput::new(vec![key('x')], false);
        let (summary, _) = run_with(transport, input, options(false, false, false));
        assert!(matches!(summary.reason, EndReason::TransportError(_)));
        assert_eq!(summary.bytes_out, 0);
        assert!(summary.stragglers.is_empty());
    }

    #[test]
    fn test_read_failure_ends_session() {
        let transport = MockTransport::failing(true, false);
        let (summary, _) =
            run_with(transport.clone(), ScriptedInput::new(vec![], false), options(false, false, false));
        assert_eq!(
            summary.reason,
            EndReason::TransportError("unplugged".to_string())
        );
        assert_eq!(summary.bytes_in, 0);
        assert!(summary.stragglers.is_empty());
        assert!(!transport.is_open());
    }

    #[test]
    fn test_blocked_input_is_left_behind() {
        let transport = MockTransport::new(&[b"bye"], false);
        let started = Instant::now();
        let (summary, out) = run_with(transport.clone(), StuckInput, options(false, false, false));
        let elapsed = started.elapsed();

        assert_eq!(summary.reason, EndReason::RemoteClosed);
        assert_eq!(summary.stragglers, vec![Pump::Outbound]);
        assert_eq!(out, b"bye");
        assert!(!transport.is_open());
        assert!(elapsed >= SHUTDOWN_GRACE, "returned after {:?}", elapsed);
        assert!(elapsed < SHUTDOWN_GRACE * 4, "returned after {:?}", elapsed);
    }

    #[test]
    fn test_transport_closed_elsewhere_ends_session() {
        let transport = MockTransport::new(&[], true);
        let closer = transport.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            closer.close();
        });
        let (summary, _) =
            run_with(transport, ScriptedInput::new(vec![], false), options(false, false, false));
        handle.join().unwrap();
        assert_eq!(summary.reason, EndReason::RemoteClosed);
        assert!(summary.stragglers.is_empty());
    }

    #[test]
    fn test_local_output_failure_keeps_relaying() {
        let transport = MockTransport::new(&[b"one", b"two"], false);
        let session = RelaySession::new(transport, options(false, true, false));
        let summary = run(
            session,
            ScriptedInput::new(vec![], false),
            LocalOutput::new(BrokenOutput),
        )
        .unwrap();
        assert_eq!(summary.reason, EndReason::RemoteClosed);
        assert_eq!(summary.bytes_in, 6);
    }

    #[test]
    fn test_panicking_pump_still_ends_session() {
        let transport = MockTransport::new(&[], true);
        let (summary, _) = run_with(transport, PanickingInput, options(false, false, false));
        assert_eq!(summary.reason, EndReason::PumpStopped(Pump::Outbound));
        assert!(summary.stragglers.is_empty());
    }
}

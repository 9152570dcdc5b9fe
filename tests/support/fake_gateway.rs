// ABOUTME: In-memory gateway transport for session, executor and broker tests.
// ABOUTME: Records dials, exec commands and PTY input; scripts kinit and exec replies.

use async_trait::async_trait;
use hopgate::ssh::{
    self, ChannelEvent, CommandOutput, Connection, Connector, GatewayCredentials,
    InteractiveChannel,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

pub const KINIT_PASSWORD: &str = "kerberos-secret";
pub const KINIT_PROMPT: &str = "Password for svc@EXAMPLE.COM: ";

/// How the fake gateway behaves for the next dial.
#[derive(Debug, Clone)]
pub struct Script {
    pub connect_error: Option<String>,
    pub connect_delay: Duration,
    /// Output chunks kinit prints before it reads its answers.
    pub kinit_chunks: Vec<String>,
    /// Password kinit accepts.
    pub kinit_password: String,
    /// Forced kinit exit status; by default 0 iff every prompt got the password.
    pub kinit_status: Option<u32>,
    /// Fail every write to the kinit PTY with this message.
    pub kinit_send_error: Option<String>,
    pub exec_output: CommandOutput,
    pub exec_error: Option<String>,
    pub exec_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            connect_error: None,
            connect_delay: Duration::ZERO,
            kinit_chunks: vec![KINIT_PROMPT.to_string()],
            kinit_password: KINIT_PASSWORD.to_string(),
            kinit_status: None,
            kinit_send_error: None,
            exec_output: CommandOutput {
                exit_status: Some(0),
                stdout: "hello\n".to_string(),
                stderr: String::new(),
            },
            exec_error: None,
            exec_delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct Shared {
    dials: AtomicUsize,
    script: Mutex<Script>,
    connections: Mutex<Vec<Arc<ConnState>>>,
    credentials: Mutex<Vec<GatewayCredentials>>,
}

/// Connector half of the fake; clones observe the same gateway.
#[derive(Clone, Default)]
pub struct FakeGateway {
    shared: Arc<Shared>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, update: impl FnOnce(&mut Script)) {
        update(&mut self.shared.script.lock());
    }

    pub fn dials(&self) -> usize {
        self.shared.dials.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Arc<ConnState> {
        Arc::clone(&self.shared.connections.lock()[index])
    }

    pub fn connection_count(&self) -> usize {
        self.shared.connections.lock().len()
    }

    /// Credentials presented on each dial, in order.
    pub fn dialed_with(&self) -> Vec<GatewayCredentials> {
        self.shared.credentials.lock().clone()
    }
}

#[async_trait]
impl Connector for FakeGateway {
    type Connection = FakeConnection;

    async fn connect(&self, credentials: &GatewayCredentials) -> ssh::Result<FakeConnection> {
        self.shared.dials.fetch_add(1, Ordering::SeqCst);
        self.shared.credentials.lock().push(credentials.clone());
        let script = self.shared.script.lock().clone();

        if !script.connect_delay.is_zero() {
            tokio::time::sleep(script.connect_delay).await;
        }
        if let Some(message) = script.connect_error.clone() {
            return Err(ssh::Error::Connection(message));
        }

        let state = Arc::new(ConnState::default());
        self.shared.connections.lock().push(Arc::clone(&state));
        Ok(FakeConnection { state, script })
    }
}

/// What happened on one fake connection.
#[derive(Debug)]
pub struct ConnState {
    execs: Mutex<Vec<String>>,
    pty_commands: Mutex<Vec<String>>,
    pty_input: Mutex<Vec<u8>>,
    close_calls: AtomicUsize,
    closed: watch::Sender<bool>,
}

impl Default for ConnState {
    fn default() -> Self {
        Self {
            execs: Mutex::new(Vec::new()),
            pty_commands: Mutex::new(Vec::new()),
            pty_input: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            closed: watch::channel(false).0,
        }
    }
}

impl ConnState {
    pub fn execs(&self) -> Vec<String> {
        self.execs.lock().clone()
    }

    pub fn pty_commands(&self) -> Vec<String> {
        self.pty_commands.lock().clone()
    }

    pub fn pty_input(&self) -> String {
        String::from_utf8_lossy(&self.pty_input.lock()).into_owned()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Simulate the gateway dropping the connection.
    pub fn drop_remote(&self) {
        self.closed.send_replace(true);
    }
}

#[derive(Debug)]
pub struct FakeConnection {
    state: Arc<ConnState>,
    script: Script,
}

#[async_trait]
impl Connection for FakeConnection {
    async fn exec(&self, command: &str) -> ssh::Result<CommandOutput> {
        if self.state.is_closed() {
            return Err(ssh::Error::Channel("connection closed".to_string()));
        }
        self.state.execs.lock().push(command.to_string());
        if !self.script.exec_delay.is_zero() {
            tokio::time::sleep(self.script.exec_delay).await;
        }
        match &self.script.exec_error {
            Some(message) => Err(ssh::Error::Channel(message.clone())),
            None => Ok(self.script.exec_output.clone()),
        }
    }

    async fn open_pty(&self, command: &str) -> ssh::Result<Box<dyn InteractiveChannel>> {
        self.state.pty_commands.lock().push(command.to_string());

        let prompts = self.script.kinit_chunks.concat().matches("Password").count();
        let expected_input = format!("{}\n", self.script.kinit_password).repeat(prompts);

        Ok(Box::new(FakePty {
            state: Arc::clone(&self.state),
            chunks: self.script.kinit_chunks.iter().cloned().collect(),
            expected_input,
            forced_status: self.script.kinit_status,
            send_error: self.script.kinit_send_error.clone(),
            exited: false,
        }))
    }

    async fn closed(&self) {
        let mut closed = self.state.closed.subscribe();
        let _ = closed.wait_for(|closed| *closed).await;
    }

    async fn close(&self) -> ssh::Result<()> {
        self.state.close_calls.fetch_add(1, Ordering::SeqCst);
        self.state.closed.send_replace(true);
        Ok(())
    }
}

struct FakePty {
    state: Arc<ConnState>,
    chunks: VecDeque<String>,
    expected_input: String,
    forced_status: Option<u32>,
    send_error: Option<String>,
    exited: bool,
}

#[async_trait]
impl InteractiveChannel for FakePty {
    async fn recv(&mut self) -> Option<ChannelEvent> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Some(ChannelEvent::Data(chunk.into_bytes()));
        }
        if self.exited {
            return None;
        }
        self.exited = true;
        let status = self.forced_status.unwrap_or_else(|| {
            if self.state.pty_input() == self.expected_input {
                0
            } else {
                1
            }
        });
        Some(ChannelEvent::ExitStatus(status))
    }

    async fn send(&mut self, data: &[u8]) -> ssh::Result<()> {
        if let Some(message) = &self.send_error {
            return Err(ssh::Error::Channel(message.clone()));
        }
        self.state.pty_input.lock().extend_from_slice(data);
        Ok(())
    }
}

/// Poll `condition` until it holds, yielding to spawned tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::task::yield_now().await;
    }
    condition()
}

use crate::channel::{Incoming, SignallingOutput};
use crate::config::NegotiatorConfig;
use crate::error::{EngineError, MediaError, NegotiationError};
use crate::media::{LocalTrack, MediaSupervisor};
use crate::rtc::{ConnectionEvent, RemoteStream, RtcEngine};
use crate::session::{ConnectionSession, SessionState};
use parley_core::SignallingMessage;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

mod create_pc_impl;
mod handle_remote_offer_impl;
mod handle_signal_impl;
mod init_connection_impl;
mod media_controls_impl;
mod teardown_impl;

/// User actions, as triggered by the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallCommand {
    Call,
    Hangup,
    PauseVideo,
    ResumeVideo,
    SwitchCamera,
    /// Tear down whatever is active and stop the event loop.
    Shutdown,
}

/// Everything the negotiator reacts to, in one ordered queue.
#[derive(Debug)]
pub enum SessionEvent {
    Command(CallCommand),
    Signal(SignallingMessage),
    Connection {
        generation: u64,
        event: ConnectionEvent,
    },
    MediaAcquired(Result<Vec<LocalTrack>, MediaError>),
    AnswerDeadline {
        generation: u64,
    },
}

/// What the rendering layer gets to see.
#[derive(Debug, Clone)]
pub enum CallEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    LocalTracks(Vec<LocalTrack>),
    RemoteStream(RemoteStream),
    Error(Arc<NegotiationError>),
}

/// Cloneable front door to a running `Negotiator`.
#[derive(Clone)]
pub struct CallHandle {
    tx: mpsc::UnboundedSender<SessionEvent>,
    notify: broadcast::Sender<CallEvent>,
    state: watch::Receiver<SessionState>,
}

impl CallHandle {
    fn command(&self, cmd: CallCommand) -> bool {
        self.tx.send(SessionEvent::Command(cmd)).is_ok()
    }

    pub fn call(&self) -> bool {
        self.command(CallCommand::Call)
    }

    pub fn hangup(&self) -> bool {
        self.command(CallCommand::Hangup)
    }

    pub fn pause_video(&self) -> bool {
        self.command(CallCommand::PauseVideo)
    }

    pub fn resume_video(&self) -> bool {
        self.command(CallCommand::ResumeVideo)
    }

    pub fn switch_camera(&self) -> bool {
        self.command(CallCommand::SwitchCamera)
    }

    pub fn shutdown(&self) -> bool {
        self.command(CallCommand::Shutdown)
    }

    /// Feed a message that arrived from the relay.
    pub fn deliver(&self, msg: SignallingMessage) -> bool {
        self.tx.send(SessionEvent::Signal(msg)).is_ok()
    }

    /// Feed everything a `SignallingChannel` receives into the negotiator.
    /// Binary frames carry no signalling and are skipped.
    pub fn forward(&self, mut incoming: mpsc::UnboundedReceiver<Incoming>) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = incoming.recv().await {
                match frame {
                    Incoming::Signal(msg) => {
                        if !handle.deliver(msg) {
                            break;
                        }
                    }
                    Incoming::Binary(data) => {
                        debug!("Skipping {} byte binary frame", data.len());
                    }
                }
            }
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.notify.subscribe()
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolves once the session reaches `state`, or returns false after `timeout`.
    pub async fn wait_for_state(&self, state: SessionState, timeout: Duration) -> bool {
        let mut rx = self.state.clone();
        tokio::time::timeout(timeout, rx.wait_for(|s| *s == state))
            .await
            .is_ok_and(|r| r.is_ok())
    }
}

/// Per-client negotiation state machine.
///
/// Owns exactly one `ConnectionSession` and processes `SessionEvent`s one at
/// a time, so every transition sees a consistent session.
pub struct Negotiator<E: RtcEngine> {
    config: NegotiatorConfig,
    engine: E,
    media: Arc<dyn MediaSupervisor>,
    signalling: Arc<dyn SignallingOutput>,
    session: ConnectionSession<E::Connection>,
    local_media: Option<Vec<LocalTrack>>,
    media_requested: bool,
    video_input_index: usize,
    next_generation: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    notify: broadcast::Sender<CallEvent>,
    state_tx: watch::Sender<SessionState>,
}

impl<E: RtcEngine> Negotiator<E> {
    pub fn new(
        config: NegotiatorConfig,
        engine: E,
        media: Arc<dyn MediaSupervisor>,
        signalling: Arc<dyn SignallingOutput>,
    ) -> (Self, CallHandle) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (notify, _) = broadcast::channel(64);
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);

        let handle = CallHandle {
            tx: events_tx.clone(),
            notify: notify.clone(),
            state: state_rx,
        };

        let negotiator = Self {
            config,
            engine,
            media,
            signalling,
            session: ConnectionSession::new(),
            local_media: None,
            media_requested: false,
            video_input_index: 0,
            next_generation: 0,
            events_tx,
            events_rx,
            notify,
            state_tx,
        };

        (negotiator, handle)
    }

    pub fn session(&self) -> &ConnectionSession<E::Connection> {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Drain the event queue until shutdown.
    pub async fn run(mut self) {
        info!("Negotiator event loop started");

        while let Some(event) = self.events_rx.recv().await {
            if !self.handle(event).await {
                break;
            }
        }

        info!("Negotiator event loop finished");
    }

    /// Process one event. Returns false when the loop should stop.
    pub async fn handle(&mut self, event: SessionEvent) -> bool {
        let result = match event {
            SessionEvent::Command(CallCommand::Shutdown) => {
                self.teardown("shutdown").await;
                return false;
            }
            SessionEvent::Command(cmd) => self.handle_command(cmd).await,
            SessionEvent::Signal(msg) => self.handle_signal(msg).await,
            SessionEvent::Connection { generation, event } => {
                self.handle_connection_event(generation, event).await
            }
            SessionEvent::MediaAcquired(result) => self.on_media_acquired(result).await,
            SessionEvent::AnswerDeadline { generation } => self.on_answer_deadline(generation).await,
        };

        if let Err(e) = result {
            error!("Negotiation error: {}", e);
            self.emit(CallEvent::Error(Arc::new(e)));
        }
        true
    }

    async fn handle_command(&mut self, cmd: CallCommand) -> Result<(), NegotiationError> {
        match cmd {
            CallCommand::Call => self.start_call().await,
            CallCommand::Hangup => self.hangup().await,
            CallCommand::PauseVideo => {
                self.set_video_enabled(false);
                Ok(())
            }
            CallCommand::ResumeVideo => {
                self.set_video_enabled(true);
                Ok(())
            }
            CallCommand::SwitchCamera => self.switch_camera().await,
            CallCommand::Shutdown => Ok(()),
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), NegotiationError> {
        let from = self.session.transition(next)?;
        info!("[Session]: {} -> {}", from, next);
        self.state_tx.send_replace(next);
        self.emit(CallEvent::StateChanged { from, to: next });
        Ok(())
    }

    fn emit(&self, event: CallEvent) {
        // Nobody listening is fine.
        let _ = self.notify.send(event);
    }

    async fn send(&self, msg: SignallingMessage) -> Result<(), NegotiationError> {
        let kind = msg.kind();
        self.signalling.send(msg).await?;
        info!("[Signalling]: sent {}", kind);
        Ok(())
    }
}

/// Run one engine step under a deadline.
async fn within<T, F>(limit: Duration, step: &'static str, fut: F) -> Result<T, NegotiationError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(NegotiationError::Engine { step, source }),
        Err(_) => {
            warn!("{} did not finish within {:?}", step, limit);
            Err(NegotiationError::Timeout { step, after: limit })
        }
    }
}

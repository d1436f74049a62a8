use async_trait::async_trait;
use parley_client::{
    ConnectionEvent, EngineError, EventSink, LocalTrack, OfferOptions, PeerConnection, RtcEngine,
};
use parley_core::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Engine steps a test can make fail or hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateConnection,
    AddTrack,
    CreateOffer,
    CreateAnswer,
    SetLocal,
    SetRemote,
    ReplaceVideo,
}

/// Everything the negotiator asked of the engine, tagged by connection generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    CreateConnection(u64),
    AddTrack(u64, String),
    CreateOffer(u64),
    CreateAnswer(u64),
    SetLocal(u64, SdpType),
    SetRemote(u64, SdpType),
    AddCandidate(u64, String),
    ReplaceVideo(u64, String),
    Detach(u64),
    StopTransceivers(u64),
    Close(u64),
}

#[derive(Default)]
struct Script {
    fail: HashSet<Step>,
    stall: HashSet<Step>,
    bad_candidates: HashSet<String>,
    candidates_after_local: Vec<String>,
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<EngineCall>>,
    script: Mutex<Script>,
    sinks: Mutex<Vec<EventSink>>,
}

/// In-memory `RtcEngine` that records calls and lets tests inject events.
#[derive(Clone, Default)]
pub struct FakeEngine {
    inner: Arc<Inner>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, step: Step) {
        self.inner.script.lock().unwrap().fail.insert(step);
    }

    pub fn stall(&self, step: Step) {
        self.inner.script.lock().unwrap().stall.insert(step);
    }

    pub fn reject_candidate(&self, candidate: &str) {
        self.inner
            .script
            .lock()
            .unwrap()
            .bad_candidates
            .insert(candidate.to_owned());
    }

    /// Gather these local candidates right after each local description.
    pub fn gather_after_local(&self, candidates: &[&str]) {
        self.inner.script.lock().unwrap().candidates_after_local =
            candidates.iter().map(|c| c.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    /// Raise a callback as if connection `generation` fired it, whether or not
    /// that connection is still alive.
    pub fn emit(&self, generation: u64, event: ConnectionEvent) -> bool {
        let sinks = self.inner.sinks.lock().unwrap();
        sinks
            .iter()
            .find(|s| s.generation() == generation)
            .is_some_and(|s| s.emit(event))
    }
}

#[async_trait]
impl RtcEngine for FakeEngine {
    type Connection = FakeConnection;

    async fn create_connection(
        &self,
        _ice_servers: &[IceServerConfig],
        events: EventSink,
    ) -> Result<FakeConnection, EngineError> {
        let generation = events.generation();
        let connection = FakeConnection {
            generation,
            inner: self.inner.clone(),
            events: events.clone(),
            detached: AtomicBool::new(false),
            remote_set: AtomicBool::new(false),
        };
        connection.step(Step::CreateConnection).await?;
        connection.record(EngineCall::CreateConnection(generation));
        self.inner.sinks.lock().unwrap().push(events);
        Ok(connection)
    }
}

pub struct FakeConnection {
    generation: u64,
    inner: Arc<Inner>,
    events: EventSink,
    detached: AtomicBool,
    remote_set: AtomicBool,
}

impl FakeConnection {
    fn record(&self, call: EngineCall) {
        self.inner.calls.lock().unwrap().push(call);
    }

    async fn step(&self, step: Step) -> Result<(), EngineError> {
        let (fail, stall) = {
            let script = self.inner.script.lock().unwrap();
            (script.fail.contains(&step), script.stall.contains(&step))
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(EngineError::Other(format!("{:?} scripted to fail", step)));
        }
        Ok(())
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn add_track(&self, track: &LocalTrack) -> Result<(), EngineError> {
        self.step(Step::AddTrack).await?;
        self.record(EngineCall::AddTrack(self.generation, track.id.clone()));
        Ok(())
    }

    async fn create_offer(&self, _options: OfferOptions) -> Result<SessionDescription, EngineError> {
        self.step(Step::CreateOffer).await?;
        self.record(EngineCall::CreateOffer(self.generation));
        Ok(SessionDescription::offer(format!("fake-offer-{}", self.generation)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, EngineError> {
        self.step(Step::CreateAnswer).await?;
        self.record(EngineCall::CreateAnswer(self.generation));
        Ok(SessionDescription::answer(format!("fake-answer-{}", self.generation)))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.step(Step::SetLocal).await?;
        self.record(EngineCall::SetLocal(self.generation, desc.sdp_type));

        let gathered = self.inner.script.lock().unwrap().candidates_after_local.clone();
        if !self.detached.load(Ordering::SeqCst) {
            for candidate in gathered {
                self.events.emit(ConnectionEvent::LocalCandidate(
                    IceCandidate::new(candidate).with_mid("0", 0),
                ));
            }
        }
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<(), EngineError> {
        self.step(Step::SetRemote).await?;
        self.record(EngineCall::SetRemote(self.generation, desc.sdp_type));
        self.remote_set.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), EngineError> {
        if !self.remote_set.load(Ordering::SeqCst) {
            return Err(EngineError::Other("remote description not set".into()));
        }
        if self
            .inner
            .script
            .lock()
            .unwrap()
            .bad_candidates
            .contains(&candidate.candidate)
        {
            return Err(EngineError::Other(format!("rejected {}", candidate.candidate)));
        }
        self.record(EngineCall::AddCandidate(self.generation, candidate.candidate));
        Ok(())
    }

    async fn replace_video_track(&self, track: &LocalTrack) -> Result<(), EngineError> {
        self.step(Step::ReplaceVideo).await?;
        self.record(EngineCall::ReplaceVideo(self.generation, track.id.clone()));
        Ok(())
    }

    fn detach_handlers(&self) {
        self.detached.store(true, Ordering::SeqCst);
        self.record(EngineCall::Detach(self.generation));
    }

    async fn stop_transceivers(&self) -> Result<(), EngineError> {
        self.record(EngineCall::StopTransceivers(self.generation));
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.record(EngineCall::Close(self.generation));
        Ok(())
    }
}

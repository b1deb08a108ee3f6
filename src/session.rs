use async_trait::async_trait;
use axum::extract::ws;
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::PracticeConfig;
use crate::content::{HeaderInfo, Question, SetAddress, TopicConfigResolver};
use crate::error::SessionError;
use crate::practice::messages::{ControlPanel, client_message_from_ws_text};
use crate::practice::{
    AvailableSets, Card, ClientToServerMessage, FeedbackDriver, FeedbackEvent, FeedbackSettings,
    FeedbackSink, LoadFailure, PageParams, QuestionLoader, RenderGeneration, RenderOrchestrator,
    RenderedView, SelectionMode, ServerToClientMessage, SessionSnapshot, Transition,
    discover_sets, select,
};

#[derive(Debug, Serialize, Clone)]
pub struct SessionDetails {
    pub session_id: Uuid,
    pub topic: String,
    pub level: String,
    pub set: u32,
    pub created_at: DateTime<Utc>,
}

/// Services shared by every session.
#[derive(Clone)]
pub struct SessionContext {
    pub loader: QuestionLoader,
    pub resolver: Arc<dyn TopicConfigResolver>,
    pub practice: Arc<PracticeConfig>,
}

/// WebSocket senders of the clients attached to one session. Delayed feedback
/// tasks hold a clone, so the map lives behind a lock rather than inside the
/// actor.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    clients: Arc<RwLock<HashMap<Uuid, mpsc::Sender<ws::Message>>>>,
}

impl ClientRegistry {
    async fn insert(&self, client_id: Uuid, client_tx: mpsc::Sender<ws::Message>) {
        self.clients.write().await.insert(client_id, client_tx);
    }

    async fn remove(&self, client_id: Uuid) -> bool {
        self.clients.write().await.remove(&client_id).is_some()
    }

    async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    async fn clear(&self) {
        self.clients.write().await.clear();
    }

    async fn send_to(&self, client_id: Uuid, message: &ServerToClientMessage) {
        let Some(client_tx) = self.clients.read().await.get(&client_id).cloned() else {
            tracing::debug!(client.id = %client_id, "Dropping message for detached client");
            return;
        };
        match message.to_ws_text() {
            Ok(ws_msg) => {
                if client_tx.send(ws_msg).await.is_err() {
                    tracing::warn!(client.id = %client_id, "Failed to send message to client");
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to serialize message"),
        }
    }

    async fn broadcast(&self, message: &ServerToClientMessage) {
        let ws_msg = match message.to_ws_text() {
            Ok(ws_msg) => ws_msg,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast");
                return;
            }
        };

        let targets: Vec<(Uuid, mpsc::Sender<ws::Message>)> = self
            .clients
            .read()
            .await
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        for (client_id, client_tx) in targets {
            if client_tx.send(ws_msg.clone()).await.is_err() {
                tracing::warn!(client.id = %client_id, "Failed to broadcast to client");
            }
        }
    }
}

#[async_trait]
impl FeedbackSink for ClientRegistry {
    async fn emit(&self, event: FeedbackEvent) {
        self.broadcast(&ServerToClientMessage::Feedback { event })
            .await;
    }
}

/// What a session knows once its page has loaded.
struct PreparedSession {
    address: SetAddress,
    header: HeaderInfo,
    available_sets: AvailableSets,
    questions: Arc<Vec<Question>>,
    load_failure: Option<LoadFailure>,
}

impl PreparedSession {
    #[tracing::instrument(skip(context), fields(set.resource = %address))]
    async fn load(context: &SessionContext, address: SetAddress) -> Self {
        let practice = &context.practice;

        // Races the main load; failures never surface.
        let _ = context.loader.prefetch_next(&address);

        let (topic_config, available_sets, loaded) = tokio::join!(
            context.resolver.resolve(&address.topic, &address.level),
            discover_sets(
                context.loader.store().as_ref(),
                &address.topic,
                &address.level,
                practice.discovery_limit,
            ),
            context.loader.load(&address),
        );

        let header = topic_config.header(
            &address.topic,
            &address.level,
            address.set,
            &practice.default_subtitle_prefix,
        );

        let (questions, load_failure) = match loaded {
            Ok(questions) => (questions, None),
            Err(e) => {
                tracing::error!(error = %e, "Failed to load question set");
                let failure = LoadFailure {
                    resource: address.resource_path(),
                    message: e.to_string(),
                };
                (Arc::new(Vec::new()), Some(failure))
            }
        };

        tracing::info!(
            sets.available = ?available_sets.as_slice(),
            questions.count = questions.len(),
            "Session prepared"
        );

        Self {
            address,
            header,
            available_sets,
            questions,
            load_failure,
        }
    }
}

#[derive(Debug)]
pub enum SessionManagerMessage {
    CreateSession {
        params: PageParams,
        respond_to: oneshot::Sender<SessionDetails>,
    },
    GetSessionHandle {
        session_id: Uuid,
        respond_to: oneshot::Sender<Option<SessionActorHandle>>,
    },
    SessionShutdown {
        session_id: Uuid,
    },
}

pub struct SessionManagerActor {
    receiver: mpsc::Receiver<SessionManagerMessage>,
    sessions: HashMap<Uuid, SessionActorHandle>,
    self_sender: mpsc::Sender<SessionManagerMessage>,
    context: SessionContext,
}

impl SessionManagerActor {
    fn new(
        receiver: mpsc::Receiver<SessionManagerMessage>,
        self_sender: mpsc::Sender<SessionManagerMessage>,
        context: SessionContext,
    ) -> Self {
        SessionManagerActor {
            receiver,
            sessions: HashMap::new(),
            self_sender,
            context,
        }
    }

    #[tracing::instrument(skip(self, msg), fields(
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionManagerMessage) {
        match msg {
            SessionManagerMessage::CreateSession { params, respond_to } => {
                let session_id = Uuid::new_v4();
                let address = params.address();

                tracing::info!(
                    session.id = %session_id,
                    set.topic = %address.topic,
                    set.level = %address.level,
                    set.id = address.set,
                    "Received CreateSession request"
                );

                let manager_handle = SessionManagerHandle {
                    sender: self.self_sender.clone(),
                };
                let handle = SessionActorHandle::spawn(
                    session_id,
                    32,
                    manager_handle,
                    params,
                    self.context.clone(),
                );
                self.sessions.insert(session_id, handle);

                let _ = respond_to.send(SessionDetails {
                    session_id,
                    topic: address.topic,
                    level: address.level,
                    set: address.set,
                    created_at: Utc::now(),
                });
            }
            SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to,
            } => {
                tracing::debug!(session.id = %session_id, "Received GetSessionHandle request");
                let _ = respond_to.send(self.sessions.get(&session_id).cloned());
            }
            SessionManagerMessage::SessionShutdown { session_id } => {
                if self.sessions.remove(&session_id).is_some() {
                    tracing::info!(
                        session.id = %session_id,
                        sessions.active = self.sessions.len(),
                        "Cleaning up session after actor shutdown"
                    );
                } else {
                    tracing::warn!(session.id = %session_id, "Received shutdown for unknown session");
                }
            }
        }
    }
}

#[tracing::instrument(skip(actor))]
pub async fn run_session_manager_actor(mut actor: SessionManagerActor) {
    tracing::info!("SessionManager actor started");
    while let Some(msg) = actor.receiver.recv().await {
        actor.handle_message(msg).await;
    }
    tracing::info!("SessionManager actor stopped");
}

#[derive(Clone, Debug)]
pub struct SessionManagerHandle {
    sender: mpsc::Sender<SessionManagerMessage>,
}

impl SessionManagerHandle {
    pub fn spawn(buffer_size: usize, context: SessionContext) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = SessionManagerActor::new(receiver, sender.clone(), context);
        tokio::spawn(run_session_manager_actor(actor));
        Self { sender }
    }

    pub async fn create_session(&self, params: PageParams) -> Result<SessionDetails, SessionError> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionManagerMessage::CreateSession { params, respond_to })
            .await
            .map_err(|e| {
                SessionError::ManagerUnavailable(format!("Failed to send CreateSession: {e}"))
            })?;
        rx.await
            .map_err(|e| SessionError::ManagerUnavailable(format!("No response: {e}")))
    }

    pub async fn get_session_handle(&self, session_id: Uuid) -> Option<SessionActorHandle> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionManagerMessage::GetSessionHandle {
                session_id,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return None;
        }
        rx.await.ok().flatten()
    }

    pub async fn notify_session_shutdown(&self, session_id: Uuid) -> Result<(), SessionError> {
        self.sender
            .send(SessionManagerMessage::SessionShutdown { session_id })
            .await
            .map_err(|e| {
                SessionError::ManagerUnavailable(format!("Failed to send SessionShutdown: {e}"))
            })
    }
}

#[derive(Debug)]
pub enum SessionActorMessage {
    ClientEvent {
        client_id: Uuid,
        raw_payload: String,
    },
    ClientConnected {
        client_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    },
    ClientDisconnected {
        client_id: Uuid,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// One practice page: the loaded set, what is displayed, and the cards being
/// answered.
pub struct SessionActor {
    receiver: mpsc::Receiver<SessionActorMessage>,
    session_id: Uuid,
    manager_handle: SessionManagerHandle,
    params: PageParams,
    address: SetAddress,
    header: HeaderInfo,
    available_sets: AvailableSets,
    questions: Arc<Vec<Question>>,
    clients: ClientRegistry,
    settings: Arc<RwLock<FeedbackSettings>>,
    orchestrator: RenderOrchestrator,
    driver: FeedbackDriver,
    cards: Vec<Card>,
    view: RenderedView,
    rng: StdRng,
    default_random_count: usize,
    idle_timeout: Duration,
}

impl SessionActor {
    fn new(
        receiver: mpsc::Receiver<SessionActorMessage>,
        session_id: Uuid,
        manager_handle: SessionManagerHandle,
        params: PageParams,
        prepared: PreparedSession,
        practice: &PracticeConfig,
    ) -> Self {
        let clients = ClientRegistry::default();
        let settings = Arc::new(RwLock::new(FeedbackSettings::default()));
        let generation = RenderGeneration::default();
        let orchestrator = RenderOrchestrator::new(generation.clone(), practice.stagger());
        let driver = FeedbackDriver::new(
            Arc::new(clients.clone()),
            Arc::clone(&settings),
            generation,
            practice.wrong_feedback_delay(),
        );

        let mut rng = StdRng::from_entropy();
        let (view, cards) = match &prepared.load_failure {
            Some(failure) => (orchestrator.render_failure(failure), Vec::new()),
            None => orchestrator.render(&prepared.questions, &mut rng),
        };

        SessionActor {
            receiver,
            session_id,
            manager_handle,
            params,
            address: prepared.address,
            header: prepared.header,
            available_sets: prepared.available_sets,
            questions: prepared.questions,
            clients,
            settings,
            orchestrator,
            driver,
            cards,
            view,
            rng,
            default_random_count: practice.default_random_count,
            idle_timeout: practice.session_idle_timeout(),
        }
    }

    async fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            header: self.header.clone(),
            control_panel: ControlPanel::new(self.address.set, &self.available_sets),
            settings: *self.settings.read().await,
            view: self.view.clone(),
        }
    }

    /// Returns `true` when the session should shut down.
    #[tracing::instrument(skip(self, msg), fields(
        session.id = %self.session_id,
        set.resource = %self.address,
        msg_type = %std::any::type_name_of_val(&msg)
    ))]
    async fn handle_message(&mut self, msg: SessionActorMessage) -> bool {
        match msg {
            SessionActorMessage::ClientEvent {
                client_id,
                raw_payload,
            } => {
                tracing::trace!(client.id = %client_id, event.raw = %raw_payload, "Raw event from client");
                match client_message_from_ws_text(&raw_payload) {
                    Ok(parsed) => {
                        tracing::debug!(client.id = %client_id, event.type = ?parsed, "Processing event from client");
                        return self.handle_client_message(client_id, parsed).await;
                    }
                    Err(e) => {
                        tracing::warn!(
                            client.id = %client_id,
                            error = %e,
                            event.raw = %raw_payload,
                            "Failed to deserialize event from client"
                        );
                        let error_response = ServerToClientMessage::SystemError {
                            message: format!(
                                "Invalid message format: {e}. Please send JSON like: {{\"messageType\":\"SelectOption\",\"payload\":{{\"card\":0,\"option\":1,\"generation\":1}}}}"
                            ),
                        };
                        self.clients.send_to(client_id, &error_response).await;
                    }
                }
            }
            SessionActorMessage::ClientConnected {
                client_id,
                client_tx,
            } => {
                tracing::debug!(client.id = %client_id, "Client connected");
                self.clients.insert(client_id, client_tx).await;
                let snapshot = self.snapshot().await;
                self.clients
                    .send_to(client_id, &ServerToClientMessage::SessionSnapshot(snapshot))
                    .await;
            }
            SessionActorMessage::ClientDisconnected { client_id } => {
                tracing::debug!(client.id = %client_id, "Client disconnected");
                return self.detach_client(client_id).await;
            }
            SessionActorMessage::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot().await);
            }
        }
        false
    }

    async fn handle_client_message(
        &mut self,
        client_id: Uuid,
        message: ClientToServerMessage,
    ) -> bool {
        match message {
            ClientToServerMessage::ConnectToSession { session_id } => {
                tracing::warn!(client.id = %client_id, requested.session = %session_id, "Client is already attached");
                self.clients
                    .send_to(
                        client_id,
                        &ServerToClientMessage::SystemError {
                            message: "Already connected to a session.".to_string(),
                        },
                    )
                    .await;
            }
            ClientToServerMessage::SelectOption {
                card,
                option,
                generation,
            } => {
                self.select_option(client_id, card, option, generation).await;
            }
            ClientToServerMessage::SwitchSet { set } => {
                if set == 0 {
                    self.clients
                        .send_to(
                            client_id,
                            &ServerToClientMessage::SystemError {
                                message: "Set numbers start at 1.".to_string(),
                            },
                        )
                        .await;
                    return false;
                }
                let query = self.params.navigation_query(set);
                tracing::info!(client.id = %client_id, set.id = set, "Navigating to another set");
                self.clients
                    .send_to(client_id, &ServerToClientMessage::Navigate { query })
                    .await;
            }
            ClientToServerMessage::Filter { parity } => {
                self.reselect(SelectionMode::Parity(parity)).await;
            }
            ClientToServerMessage::Random { count } => {
                let mode =
                    SelectionMode::random_from_input(count.as_deref(), self.default_random_count);
                self.reselect(mode).await;
            }
            ClientToServerMessage::ShowAll => {
                self.reselect(SelectionMode::All).await;
            }
            ClientToServerMessage::ToggleSound => {
                self.update_settings(|settings| settings.sound = !settings.sound)
                    .await;
            }
            ClientToServerMessage::ToggleConfetti => {
                self.update_settings(|settings| settings.confetti = !settings.confetti)
                    .await;
            }
            ClientToServerMessage::LeaveSession => {
                tracing::info!(client.id = %client_id, "Client left the session");
                return self.detach_client(client_id).await;
            }
        }
        false
    }

    async fn detach_client(&mut self, client_id: Uuid) -> bool {
        self.clients.remove(client_id).await;
        if self.clients.is_empty().await {
            tracing::info!("Session is now empty. Triggering shutdown");
            return true;
        }
        false
    }

    async fn select_option(
        &mut self,
        client_id: Uuid,
        card_index: usize,
        option: usize,
        seen_generation: u64,
    ) {
        let generation = self.view.generation;
        // The client clicked on a view that has since been replaced.
        if seen_generation != generation {
            tracing::debug!(
                client.id = %client_id,
                card.index = card_index,
                view.generation = generation,
                selection.generation = seen_generation,
                "Ignoring selection made on an outdated view"
            );
            return;
        }
        let Some(card) = self.cards.get_mut(card_index) else {
            tracing::warn!(client.id = %client_id, card.index = card_index, "Selection for unknown card");
            self.clients
                .send_to(
                    client_id,
                    &ServerToClientMessage::SystemError {
                        message: format!("Card {card_index} does not exist."),
                    },
                )
                .await;
            return;
        };

        match card.select(option, generation, &self.driver).await {
            Ok(Transition::Correct) => {
                tracing::info!(card.number = card_index + 1, "Card answered");
                self.view.mark_answered(card_index);
            }
            Ok(Transition::Incorrect) | Ok(Transition::Ignored) => {}
            Err(e) => {
                tracing::warn!(client.id = %client_id, error = %e, "Rejected selection");
                self.clients
                    .send_to(
                        client_id,
                        &ServerToClientMessage::SystemError {
                            message: e.to_string(),
                        },
                    )
                    .await;
            }
        }
    }

    async fn reselect(&mut self, mode: SelectionMode) {
        let displayed = select(&self.questions, mode, &mut self.rng);
        tracing::info!(
            selection.mode = ?mode,
            questions.displayed = displayed.len(),
            questions.total = self.questions.len(),
            "Displayed questions changed"
        );

        let (view, cards) = self.orchestrator.render(&displayed, &mut self.rng);
        self.cards = cards;
        self.view = view;
        self.clients
            .broadcast(&ServerToClientMessage::Rendered {
                view: self.view.clone(),
            })
            .await;
    }

    async fn update_settings<F>(&mut self, change: F)
    where
        F: FnOnce(&mut FeedbackSettings),
    {
        let settings = {
            let mut guard = self.settings.write().await;
            change(&mut *guard);
            *guard
        };
        tracing::debug!(
            settings.sound = settings.sound,
            settings.confetti = settings.confetti,
            "Feedback settings changed"
        );
        self.clients
            .broadcast(&ServerToClientMessage::SettingsChanged { settings })
            .await;
    }
}

#[tracing::instrument(skip(actor), fields(
    session.id = %actor.session_id,
    set.resource = %actor.address
))]
pub async fn run_session_actor(mut actor: SessionActor) {
    tracing::info!("Session actor started");

    let mut last_activity = Instant::now();

    loop {
        tokio::select! {
            maybe_msg = actor.receiver.recv() => {
                match maybe_msg {
                    Some(msg) => {
                        if matches!(
                            msg,
                            SessionActorMessage::ClientEvent { .. }
                                | SessionActorMessage::ClientConnected { .. }
                        ) {
                            last_activity = Instant::now();
                        }
                        if actor.handle_message(msg).await {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Session actor channel closed. Shutting down");
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(last_activity + actor.idle_timeout) => {
                tracing::info!(
                    session.idle_timeout_secs = actor.idle_timeout.as_secs(),
                    "Session inactivity timeout"
                );
                break;
            }
        }
    }

    tracing::info!("Session actor stopping");

    // Dropping the senders ends every client's send loop.
    actor.clients.clear().await;

    if let Err(e) = actor
        .manager_handle
        .notify_session_shutdown(actor.session_id)
        .await
    {
        tracing::error!(error = %e, "Failed to notify SessionManager of shutdown");
    }
}

#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    pub sender: mpsc::Sender<SessionActorMessage>,
    pub session_id: Uuid,
}

impl SessionActorHandle {
    /// Spawns the session. The set is loaded inside the task; messages sent
    /// meanwhile wait in the channel.
    pub fn spawn(
        session_id: Uuid,
        buffer_size: usize,
        manager_handle: SessionManagerHandle,
        params: PageParams,
        context: SessionContext,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        tokio::spawn(async move {
            let prepared = PreparedSession::load(&context, params.address()).await;
            let actor = SessionActor::new(
                receiver,
                session_id,
                manager_handle,
                params,
                prepared,
                &context.practice,
            );
            run_session_actor(actor).await;
        });
        Self { sender, session_id }
    }

    pub async fn forward_client_event(
        &self,
        client_id: Uuid,
        raw_payload: String,
    ) -> Result<(), SessionError> {
        self.sender
            .send(SessionActorMessage::ClientEvent {
                client_id,
                raw_payload,
            })
            .await
            .map_err(|_| SessionError::Closed(self.session_id))
    }

    pub async fn client_connected(
        &self,
        client_id: Uuid,
        client_tx: mpsc::Sender<ws::Message>,
    ) -> Result<(), SessionError> {
        self.sender
            .send(SessionActorMessage::ClientConnected {
                client_id,
                client_tx,
            })
            .await
            .map_err(|_| SessionError::Closed(self.session_id))
    }

    pub async fn client_disconnected(&self, client_id: Uuid) {
        if self
            .sender
            .send(SessionActorMessage::ClientDisconnected { client_id })
            .await
            .is_err()
        {
            tracing::debug!(session.id = %self.session_id, "Session already stopped before disconnect");
        }
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (respond_to, rx) = oneshot::channel();
        self.sender
            .send(SessionActorMessage::GetSnapshot { respond_to })
            .await
            .map_err(|_| SessionError::Closed(self.session_id))?;
        rx.await.map_err(|_| SessionError::Closed(self.session_id))
    }
}

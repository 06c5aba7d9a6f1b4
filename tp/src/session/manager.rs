//! PlanSession - actor that owns the live itinerary
//!
//! One tokio task holds the frame decoder, the delta buffer, the
//! [`PlanReconciler`] and the [`ReorderEngine`]. Stream chunks, pointer
//! events, enrichment patches and queries all arrive on one channel and are
//! handled in arrival order; no handler awaits while it mutates the document.
//!
//! ```text
//!  generator ──bytes──> reader task ──StreamChunk{turn}──┐
//!  UI ──────────────────pointer / layout commands────────┼──> actor ──> EventBus
//!  enrichment task ─────ApplyPatch{turn}─────────────────┘
//! ```
//!
//! Reader and enrichment tasks hold only a weak sender, so dropping every
//! [`PlanSession`] handle stops the actor.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{Config, StreamConfig};
use crate::enrich::{self, Enricher};
use crate::events::{EventBus, EventEmitter, PlanEvent};
use crate::generator::{GeneratorError, PlanGenerator, PlanRequest};
use crate::plan::{
    DEFAULT_COLUMN_PENALTY, DropSlot, FinalPlan, ItemPatch, LayoutMode, PlanError, PlanLimits, PlanReconciler, Point,
    Rect, ReorderEffect, ReorderEngine, SlotRef, extract,
};
use crate::stream::{FrameDecoder, FrameDispatcher, FrameKind, StreamFrame, Utf8Reassembler};

use super::messages::{SessionCommand, SessionError, SessionResponse, SessionSnapshot};

/// Command channel capacity
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Everything a session needs besides its generator
#[derive(Clone)]
pub struct SessionOptions {
    pub limits: PlanLimits,
    pub stream: StreamConfig,
    pub column_penalty: f64,
    pub enricher: Option<Arc<dyn Enricher>>,
    pub enrich_concurrency: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            limits: PlanLimits::default(),
            stream: StreamConfig::default(),
            column_penalty: DEFAULT_COLUMN_PENALTY,
            enricher: None,
            enrich_concurrency: 4,
        }
    }
}

impl SessionOptions {
    /// Options from config; the enricher is attached separately
    pub fn from_config(config: &Config) -> Self {
        Self {
            limits: config.plan.limits(),
            stream: config.stream.clone(),
            column_penalty: config.reorder.column_penalty,
            enricher: None,
            enrich_concurrency: config.enrichment.concurrency,
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }
}

/// Handle to send commands to the PlanSession actor
#[derive(Clone)]
pub struct PlanSession {
    tx: mpsc::Sender<SessionCommand>,
    bus: EventBus,
}

impl PlanSession {
    /// Spawn a new PlanSession actor
    pub fn spawn(generator: Arc<dyn PlanGenerator>, options: SessionOptions) -> Self {
        debug!(limits = ?options.limits, "spawn: called");
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let bus = EventBus::with_default_capacity();

        let actor = SessionActor::new(generator, options, bus.clone(), tx.downgrade());
        tokio::spawn(actor_loop(actor, rx));

        info!("PlanSession spawned");
        Self { tx, bus }
    }

    /// Subscribe to plan events
    pub fn subscribe(&self) -> broadcast::Receiver<PlanEvent> {
        self.bus.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SessionCommand) -> SessionResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::ChannelError)?;
        reply_rx.await.map_err(|_| SessionError::ChannelError)
    }

    // === Turn lifecycle ===

    /// Clear the plan and start streaming a new one; returns the turn number
    pub async fn start_turn(&self, request: PlanRequest) -> SessionResponse<u64> {
        debug!(message = %request.message, "start_turn: called");
        request.validate()?;
        self.request(|reply| SessionCommand::StartTurn { request, reply }).await?
    }

    /// Stop the current stream, keeping whatever was merged; false if nothing was streaming
    pub async fn cancel_turn(&self) -> SessionResponse<bool> {
        debug!("cancel_turn: called");
        self.request(|reply| SessionCommand::CancelTurn { reply }).await?
    }

    /// Start a turn and wait until it ends, including post-finalize enrichment
    pub async fn run_turn(&self, request: PlanRequest) -> SessionResponse<SessionSnapshot> {
        debug!(message = %request.message, "run_turn: called");
        let mut events = self.subscribe();
        let turn = self.start_turn(request).await?;

        let mut ended = None;
        let mut enrichment_done = false;
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "run_turn: event subscriber lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SessionError::ChannelError),
            };
            if event.turn() != turn {
                continue;
            }

            match event {
                PlanEvent::TurnEnded { finalized, .. } => ended = Some(finalized),
                PlanEvent::EnrichmentFinished { .. } => enrichment_done = true,
                _ => {}
            }

            if let Some(finalized) = ended {
                let snapshot = self.snapshot().await?;
                if !finalized || enrichment_done || !snapshot.enriching {
                    return Ok(snapshot);
                }
            }
        }
    }

    // === Pointer events ===

    pub async fn pointer_down(&self, source: SlotRef, pointer: Point, item_rect: Rect) -> SessionResponse<ReorderEffect> {
        debug!(%source, "pointer_down: called");
        self.request(|reply| SessionCommand::PointerDown {
            source,
            pointer,
            item_rect,
            reply,
        })
        .await
    }

    pub async fn pointer_move(&self, pointer: Point) -> SessionResponse<ReorderEffect> {
        self.request(|reply| SessionCommand::PointerMove { pointer, reply }).await
    }

    pub async fn pointer_up(&self, pointer: Point) -> SessionResponse<ReorderEffect> {
        debug!(?pointer, "pointer_up: called");
        self.request(|reply| SessionCommand::PointerUp { pointer, reply }).await
    }

    pub async fn cancel_drag(&self) -> SessionResponse<ReorderEffect> {
        debug!("cancel_drag: called");
        self.request(|reply| SessionCommand::CancelDrag { reply }).await
    }

    pub async fn set_layout(&self, layout: LayoutMode) -> SessionResponse<()> {
        debug!(?layout, "set_layout: called");
        self.request(|reply| SessionCommand::SetLayout { layout, reply }).await
    }

    pub async fn set_slots(&self, slots: Vec<DropSlot>) -> SessionResponse<()> {
        debug!(slot_count = slots.len(), "set_slots: called");
        self.request(|reply| SessionCommand::SetSlots { slots, reply }).await
    }

    // === Enrichment ===

    /// Merge metadata into an item of the current turn
    pub async fn apply_patch(&self, day: usize, index: usize, patch: ItemPatch) -> SessionResponse<SlotRef> {
        debug!(day, index, "apply_patch: called");
        self.request(|reply| SessionCommand::ApplyPatch {
            turn: None,
            day,
            index,
            patch,
            reply: Some(reply),
        })
        .await?
    }

    // === Queries ===

    pub async fn snapshot(&self) -> SessionResponse<SessionSnapshot> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Shutdown the PlanSession
    pub async fn shutdown(&self) -> SessionResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::ChannelError)
    }
}

/// State owned by the actor task
struct SessionActor {
    generator: Arc<dyn PlanGenerator>,
    enricher: Option<Arc<dyn Enricher>>,
    enrich_concurrency: usize,
    stream: StreamConfig,
    bus: EventBus,
    emitter: EventEmitter,
    self_tx: mpsc::WeakSender<SessionCommand>,

    reconciler: PlanReconciler,
    reorder: ReorderEngine,
    decoder: FrameDecoder,
    dispatcher: FrameDispatcher,
    /// Concatenated token deltas for the current turn
    buffer: String,
    /// Buffer grew since the last extraction
    dirty: bool,

    request: Option<PlanRequest>,
    reply_text: Option<String>,
    streaming: bool,
    /// A failure was already surfaced for this turn
    failed: bool,
    reader: Option<JoinHandle<()>>,
    enrichment: Option<JoinHandle<()>>,
}

impl SessionActor {
    fn new(
        generator: Arc<dyn PlanGenerator>,
        options: SessionOptions,
        bus: EventBus,
        self_tx: mpsc::WeakSender<SessionCommand>,
    ) -> Self {
        let emitter = bus.emitter_for(0);
        Self {
            generator,
            enricher: options.enricher,
            enrich_concurrency: options.enrich_concurrency,
            decoder: new_decoder(&options.stream),
            dispatcher: FrameDispatcher::from_config(&options.stream),
            stream: options.stream,
            bus,
            emitter,
            self_tx,
            reconciler: PlanReconciler::new(options.limits),
            reorder: ReorderEngine::new(options.column_penalty),
            buffer: String::new(),
            dirty: false,
            request: None,
            reply_text: None,
            streaming: false,
            failed: false,
            reader: None,
            enrichment: None,
        }
    }

    fn turn(&self) -> u64 {
        self.reconciler.turn()
    }

    fn start_turn(&mut self, request: PlanRequest) -> u64 {
        if self.streaming {
            debug!(turn = self.turn(), "start_turn: superseding open turn");
            self.cancel_turn();
        }
        self.abort_tasks();

        let turn = self.reconciler.begin_turn();
        if self.reorder.is_dragging() {
            debug!("start_turn: abandoning drag from previous turn");
            self.reorder.cancel();
        }
        self.decoder = new_decoder(&self.stream);
        self.buffer.clear();
        self.dirty = false;
        self.reply_text = None;
        self.failed = false;
        self.streaming = true;
        self.emitter = self.bus.emitter_for(turn);
        self.emitter.turn_started(&request.message);

        self.reader = Some(tokio::spawn(read_stream(
            Arc::clone(&self.generator),
            request.clone(),
            turn,
            self.self_tx.clone(),
        )));
        self.request = Some(request);
        info!(turn, "start_turn: streaming");
        turn
    }

    fn cancel_turn(&mut self) -> bool {
        if !self.streaming {
            debug!("cancel_turn: nothing streaming");
            return false;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        self.streaming = false;
        info!(turn = self.turn(), "cancel_turn: stream aborted, keeping merged plan");
        self.emitter.turn_cancelled();
        self.emitter.turn_ended(self.reconciler.is_finalized());
        true
    }

    fn is_current(&self, turn: u64) -> bool {
        turn == self.turn() && self.streaming
    }

    fn on_chunk(&mut self, turn: u64, text: &str) {
        if !self.is_current(turn) {
            debug!(turn, current = self.turn(), "on_chunk: dropping chunk for stale turn");
            return;
        }

        let mut frames = Vec::new();
        self.decoder.feed(text, |frame| frames.push(frame));
        for frame in frames {
            self.on_frame(frame);
            if !self.streaming {
                return;
            }
        }
        self.merge_pending();
    }

    fn on_closed(&mut self, turn: u64, error: Option<GeneratorError>) {
        if !self.is_current(turn) {
            debug!(turn, current = self.turn(), "on_closed: ignoring close for stale turn");
            return;
        }

        let mut frames = Vec::new();
        if let Some(residual) = self.decoder.finish(|frame| frames.push(frame)) {
            warn!(
                residual_len = residual.len(),
                "on_closed: dropping undelimited trailing frame"
            );
        }
        for frame in frames {
            self.on_frame(frame);
            if !self.streaming {
                return;
            }
        }
        self.merge_pending();

        if let Some(error) = error {
            self.fail_turn(&error);
        }
        self.end_turn();
    }

    fn on_frame(&mut self, frame: StreamFrame) {
        match self.dispatcher.classify(frame) {
            FrameKind::Delta(text) => {
                self.buffer.push_str(&text);
                self.dirty = true;
            }
            FrameKind::Final(payload) => {
                self.merge_pending();
                self.on_final(&payload);
            }
            FrameKind::ServerError(message) => {
                self.merge_pending();
                self.fail_turn(&GeneratorError::Server(message));
                if let Some(reader) = self.reader.take() {
                    reader.abort();
                }
                self.end_turn();
            }
            FrameKind::Ignored { event_type } => {
                debug!(%event_type, "on_frame: ignoring frame");
            }
        }
    }

    /// Extract from the delta buffer and merge, once per batch of frames
    fn merge_pending(&mut self) {
        if !self.dirty {
            return;
        }
        self.dirty = false;

        let candidate = extract(&self.buffer);
        let outcome = self.reconciler.merge_progress(&candidate);
        if outcome.added > 0 {
            self.emitter
                .items_merged(outcome.added, self.reconciler.document().total_items());
        }
    }

    fn on_final(&mut self, payload: &str) {
        let result = FinalPlan::parse(payload).and_then(|plan| {
            let reply_text = plan.reply_text.clone();
            self.reconciler.finalize(plan).map(|report| (reply_text, report))
        });

        match result {
            Ok((reply_text, report)) => {
                info!(
                    turn = report.turn,
                    days = report.days,
                    backfilled = report.backfilled,
                    "on_final: plan finalized"
                );
                self.emitter.finalized(&reply_text, report);
                self.reply_text = Some(reply_text);
                self.spawn_enrichment();
            }
            Err(PlanError::AlreadyFinalized(turn)) => {
                debug!(turn, "on_final: duplicate final frame ignored");
            }
            Err(e) => {
                warn!(error = %e, "on_final: keeping progressive plan");
                self.emitter.finalize_failed(&e.to_string());
            }
        }
    }

    /// Surface at most one failure per turn
    fn fail_turn(&mut self, error: &GeneratorError) {
        if self.failed {
            debug!(error = %error, "fail_turn: failure already reported for this turn");
            return;
        }
        self.failed = true;
        warn!(turn = self.turn(), error = %error, "fail_turn: turn failed");
        self.emitter.turn_failed(&error.to_string());
    }

    fn end_turn(&mut self) {
        self.streaming = false;
        self.reader = None;
        info!(
            turn = self.turn(),
            finalized = self.reconciler.is_finalized(),
            items = self.reconciler.document().total_items(),
            "end_turn: stream closed"
        );
        self.emitter.turn_ended(self.reconciler.is_finalized());
    }

    fn spawn_enrichment(&mut self) {
        let Some(enricher) = self.enricher.clone() else {
            return;
        };
        let targets = enrich::targets(self.reconciler.document());
        let context = self
            .request
            .as_ref()
            .and_then(|request| request.context())
            .map(str::to_string);

        debug!(targets = targets.len(), "spawn_enrichment: called");
        self.enrichment = Some(tokio::spawn(run_enrichment(
            enrich::lookup_all(enricher, targets, context, self.enrich_concurrency),
            self.turn(),
            self.self_tx.clone(),
        )));
    }

    fn apply_patch(&mut self, turn: Option<u64>, day: usize, index: usize, patch: ItemPatch) -> SessionResponse<SlotRef> {
        let turn = turn.unwrap_or(self.turn());
        if turn != self.turn() {
            debug!(turn, current = self.turn(), "apply_patch: patch for stale turn");
            return Err(SessionError::Plan(PlanError::StaleTarget {
                key: patch.expected_key.unwrap_or_default(),
            }));
        }

        let slot = self.reconciler.apply_item_patch(day, index, patch)?;
        self.emitter.item_patched(slot);
        Ok(slot)
    }

    fn on_enrichment_done(&mut self, turn: u64, hits: usize) {
        if turn != self.turn() {
            return;
        }
        self.enrichment = None;
        info!(turn, hits, "on_enrichment_done: lookups finished");
        self.emitter.enrichment_finished(hits);
    }

    fn pointer_down(&mut self, source: SlotRef, pointer: Point, item_rect: Rect) -> ReorderEffect {
        let effect = self.reorder.pointer_down(source, pointer, item_rect, &self.reconciler);
        if let ReorderEffect::DragStarted { source } = effect {
            self.emitter.drag_started(source);
        }
        effect
    }

    fn pointer_up(&mut self, pointer: Point) -> ReorderEffect {
        let effect = self.reorder.pointer_up(pointer, &mut self.reconciler);
        match &effect {
            ReorderEffect::Dropped { outcome } => self.emitter.item_moved(*outcome),
            ReorderEffect::Rejected { reason } => self.emitter.move_rejected(*reason),
            _ => {}
        }
        effect
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            turn: self.turn(),
            finalized: self.reconciler.is_finalized(),
            streaming: self.streaming,
            enriching: self.enrichment.is_some(),
            reply_text: self.reply_text.clone(),
            request: self.request.clone(),
            layout: self.reorder.layout(),
            dragging: self.reorder.session().map(|session| session.source),
            document: self.reconciler.document().clone(),
        }
    }

    fn abort_tasks(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if let Some(enrichment) = self.enrichment.take() {
            enrichment.abort();
        }
    }
}

fn new_decoder(config: &StreamConfig) -> FrameDecoder {
    FrameDecoder::new()
        .with_sentinel(config.done_sentinel.clone())
        .with_flush_trailing(config.flush_trailing_frame)
}

/// Post a command back to the actor; false once the session is gone
async fn post(tx: &mpsc::WeakSender<SessionCommand>, cmd: SessionCommand) -> bool {
    match tx.upgrade() {
        Some(tx) => tx.send(cmd).await.is_ok(),
        None => false,
    }
}

/// Read one generator stream, forwarding decoded text tagged with its turn
async fn read_stream(
    generator: Arc<dyn PlanGenerator>,
    request: PlanRequest,
    turn: u64,
    tx: mpsc::WeakSender<SessionCommand>,
) {
    debug!(turn, "read_stream: called");
    let result = async {
        let mut stream = generator.generate(&request).await?;
        let mut utf8 = Utf8Reassembler::new();

        while let Some(chunk) = stream.next().await {
            let text = utf8.push(&chunk?);
            if !text.is_empty() && !post(&tx, SessionCommand::StreamChunk { turn, text }).await {
                return Err(GeneratorError::Cancelled);
            }
        }

        let tail = utf8.finish();
        if !tail.is_empty() {
            post(&tx, SessionCommand::StreamChunk { turn, text: tail }).await;
        }
        Ok::<(), GeneratorError>(())
    }
    .await;

    if let Err(e) = &result {
        debug!(turn, error = %e, "read_stream: stream ended with error");
    }
    post(&tx, SessionCommand::StreamClosed {
        turn,
        error: result.err(),
    })
    .await;
}

/// Forward lookup hits to the actor as patches for `turn`
async fn run_enrichment(
    mut hits: futures::stream::BoxStream<'static, (SlotRef, ItemPatch)>,
    turn: u64,
    tx: mpsc::WeakSender<SessionCommand>,
) {
    let mut count = 0;
    while let Some((slot, patch)) = hits.next().await {
        count += 1;
        let cmd = SessionCommand::ApplyPatch {
            turn: Some(turn),
            day: slot.day,
            index: slot.index,
            patch,
            reply: None,
        };
        if !post(&tx, cmd).await {
            return;
        }
    }
    post(&tx, SessionCommand::EnrichmentDone { turn, hits: count }).await;
}

async fn actor_loop(mut actor: SessionActor, mut rx: mpsc::Receiver<SessionCommand>) {
    debug!("PlanSession actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            SessionCommand::StartTurn { request, reply } => {
                debug!("actor_loop: StartTurn command");
                let _ = reply.send(Ok(actor.start_turn(request)));
            }

            SessionCommand::CancelTurn { reply } => {
                debug!("actor_loop: CancelTurn command");
                let _ = reply.send(Ok(actor.cancel_turn()));
            }

            SessionCommand::StreamChunk { turn, text } => {
                debug!(turn, len = text.len(), "actor_loop: StreamChunk command");
                actor.on_chunk(turn, &text);
            }

            SessionCommand::StreamClosed { turn, error } => {
                debug!(turn, failed = error.is_some(), "actor_loop: StreamClosed command");
                actor.on_closed(turn, error);
            }

            SessionCommand::PointerDown {
                source,
                pointer,
                item_rect,
                reply,
            } => {
                debug!(%source, "actor_loop: PointerDown command");
                let _ = reply.send(actor.pointer_down(source, pointer, item_rect));
            }

            SessionCommand::PointerMove { pointer, reply } => {
                let _ = reply.send(actor.reorder.pointer_move(pointer));
            }

            SessionCommand::PointerUp { pointer, reply } => {
                debug!("actor_loop: PointerUp command");
                let _ = reply.send(actor.pointer_up(pointer));
            }

            SessionCommand::CancelDrag { reply } => {
                debug!("actor_loop: CancelDrag command");
                let _ = reply.send(actor.reorder.cancel());
            }

            SessionCommand::SetLayout { layout, reply } => {
                debug!(?layout, "actor_loop: SetLayout command");
                actor.reorder.set_layout(layout);
                let _ = reply.send(());
            }

            SessionCommand::SetSlots { slots, reply } => {
                debug!(slot_count = slots.len(), "actor_loop: SetSlots command");
                actor.reorder.set_slots(slots);
                let _ = reply.send(());
            }

            SessionCommand::ApplyPatch {
                turn,
                day,
                index,
                patch,
                reply,
            } => {
                debug!(?turn, day, index, "actor_loop: ApplyPatch command");
                let result = actor.apply_patch(turn, day, index, patch);
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(e) = result {
                            debug!(error = %e, "actor_loop: enrichment patch skipped");
                        }
                    }
                }
            }

            SessionCommand::EnrichmentDone { turn, hits } => {
                debug!(turn, hits, "actor_loop: EnrichmentDone command");
                actor.on_enrichment_done(turn, hits);
            }

            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(actor.snapshot());
            }

            SessionCommand::Shutdown => {
                debug!("actor_loop: Shutdown command");
                info!("PlanSession shutting down");
                break;
            }
        }
    }

    actor.abort_tasks();
    debug!("PlanSession actor stopped");
}

//! The feed session: one task that owns the post list, the comment and like
//! caches and the change-feed subscription. Everything else talks to it
//! through a [`FeedHandle`].
//!
//! The session never awaits the store itself. Remote work is spawned and
//! reports back as a [`Completion`], so commands and change events keep
//! flowing while a request is outstanding, and only the session loop ever
//! touches state.

use crate::{
    clipboard::Clipboard,
    comments::{self, Comment, CommentThreads},
    config::FeedConfig,
    identity::Identity,
    likes::{self, LikeTracker},
    message::{self, Message},
    post::{Post, PostId, UserId},
    remote::{ChangeEvent, ChangeKind, DataService, Subscription, Table},
    state::{FeedEvent, FeedSnapshot, Notification, Phase, Route},
    stream::{self, PostList},
    FeedError, FeedResult, Responder,
};
use chrono::Utc;
use futures::future::join_all;
use std::{
    collections::{HashMap, HashSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};

const TRY_AGAIN: &str = "Please try again later.";

enum FeedCommand {
    Snapshot { resp: Responder<FeedSnapshot> },
    WhenReady { resp: Responder<FeedSnapshot> },
    Reload { resp: Responder<FeedSnapshot> },
    Next { resp: Responder<usize> },
    Previous { resp: Responder<usize> },
    Like { post_id: PostId, resp: Responder<FeedResult<bool>> },
    ToggleComments { post_id: PostId, resp: Responder<bool> },
    SetDraft { text: String },
    SubmitComment { post_id: PostId, resp: Responder<FeedResult<Vec<Comment>>> },
    Share { post_id: PostId, resp: Responder<FeedResult<String>> },
    SendMessage {
        receiver_id: UserId,
        content: String,
        resp: Responder<FeedResult<Message>>,
    },
    SignOut { resp: Responder<FeedResult<()>> },
    Unmount { resp: Responder<()> },
}

struct LoadedBatch {
    posts: Vec<Post>,
    liked: HashMap<PostId, bool>,
    threads: Vec<(PostId, Vec<Comment>)>,
}

/// Result of a spawned remote operation, handed back to the session loop.
enum Completion {
    Loaded {
        generation: u64,
        viewer: Option<UserId>,
        result: FeedResult<LoadedBatch>,
    },
    Hydrated {
        post_id: PostId,
        viewer: Option<UserId>,
        result: FeedResult<Option<(Post, HashMap<PostId, bool>)>>,
    },
    ThreadFetched {
        post_id: PostId,
        result: FeedResult<Vec<Comment>>,
        focus: bool,
    },
    LikeWritten {
        post_id: PostId,
        viewer: UserId,
        liked: bool,
        result: FeedResult<()>,
        resp: Responder<FeedResult<bool>>,
    },
    CommentPosted {
        post_id: PostId,
        text: String,
        result: FeedResult<()>,
        thread: Option<FeedResult<Vec<Comment>>>,
        resp: Responder<FeedResult<Vec<Comment>>>,
    },
    Shared {
        url: String,
        result: FeedResult<()>,
        resp: Responder<FeedResult<String>>,
    },
    MessageSent {
        result: FeedResult<Message>,
        resp: Responder<FeedResult<Message>>,
    },
    SignedOut {
        result: FeedResult<()>,
        resp: Responder<FeedResult<()>>,
    },
}

struct Session {
    service: Arc<dyn DataService>,
    identity: Arc<dyn Identity>,
    clipboard: Arc<dyn Clipboard>,
    origin: String,
    focus_delay: Duration,
    events: broadcast::Sender<FeedEvent>,
    done: mpsc::UnboundedSender<Completion>,

    phase: Phase,
    load_error: bool,
    generation: u64,
    posts: PostList,
    threads: CommentThreads,
    likes: LikeTracker,
    comments_open: bool,
    draft: String,
    /// Realtime inserts waiting for their author join.
    hydrating: HashSet<PostId>,
    ready_waiters: Vec<Responder<FeedSnapshot>>,
}

/// Start a feed session and return a handle to it. Must be called from
/// within a tokio runtime.
pub fn mount(
    service: Arc<dyn DataService>,
    identity: Arc<dyn Identity>,
    clipboard: Arc<dyn Clipboard>,
    config: &FeedConfig,
) -> FeedHandle {
    let (commands_tx, commands_rx) = mpsc::channel(config.command_buffer.max(1));
    let (events, _) = broadcast::channel(config.event_buffer.max(1));
    let (done, completions) = mpsc::unbounded_channel();

    let session = Session {
        service,
        identity,
        clipboard,
        origin: config.app_origin.clone(),
        focus_delay: config.focus_delay(),
        events: events.clone(),
        done,
        phase: Phase::Uninitialized,
        load_error: false,
        generation: 0,
        posts: PostList::default(),
        threads: CommentThreads::default(),
        likes: LikeTracker::default(),
        comments_open: false,
        draft: String::new(),
        hydrating: HashSet::new(),
        ready_waiters: Vec::new(),
    };
    tokio::spawn(session.run(commands_rx, completions));

    FeedHandle {
        commands: commands_tx,
        events,
    }
}

async fn next_change(subscription: &mut Option<Subscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(sub) => sub.events.recv().await,
        None => std::future::pending().await,
    }
}

impl Session {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<FeedCommand>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        let mut subscription = match self.service.subscribe(Table::Posts).await {
            Ok(sub) => Some(sub),
            Err(err) => {
                warn!("Live updates unavailable: {err}");
                None
            }
        };
        self.start_load();

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(FeedCommand::Unmount { resp }) => {
                        self.teardown(subscription.take()).await;
                        let _ = resp.send(());
                        return;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                Some(done) = completions.recv() => self.handle_completion(done),
                change = next_change(&mut subscription) => match change {
                    Some(event) => self.handle_change(event),
                    None => {
                        warn!("Change feed closed; live updates stopped");
                        subscription = None;
                    }
                },
            }
        }
        self.teardown(subscription.take()).await;
    }

    async fn teardown(&mut self, subscription: Option<Subscription>) {
        if let Some(sub) = subscription {
            if let Err(err) = self.service.unsubscribe(sub.id).await {
                warn!("Unable to close subscription {}: {err}", sub.id);
            }
        }
        self.ready_waiters.clear();
        info!("Feed session unmounted");
    }

    // ***
    // Command handlers
    // ***

    fn handle_command(&mut self, cmd: FeedCommand) {
        match cmd {
            FeedCommand::Snapshot { resp } => {
                let _ = resp.send(self.snapshot());
            }
            FeedCommand::WhenReady { resp } => self.when_ready(resp),
            FeedCommand::Reload { resp } => {
                self.start_load();
                self.when_ready(resp);
            }
            FeedCommand::Next { resp } => {
                let before = self.posts.index();
                let index = self.posts.next();
                self.cursor_moved(before, index);
                let _ = resp.send(index);
            }
            FeedCommand::Previous { resp } => {
                let before = self.posts.index();
                let index = self.posts.previous();
                self.cursor_moved(before, index);
                let _ = resp.send(index);
            }
            FeedCommand::Like { post_id, resp } => self.like(post_id, resp),
            FeedCommand::ToggleComments { post_id, resp } => {
                let _ = resp.send(self.toggle_comments(post_id));
            }
            FeedCommand::SetDraft { text } => {
                self.draft = text;
                self.changed();
            }
            FeedCommand::SubmitComment { post_id, resp } => self.submit_comment(post_id, resp),
            FeedCommand::Share { post_id, resp } => self.share(post_id, resp),
            FeedCommand::SendMessage {
                receiver_id,
                content,
                resp,
            } => self.send_message(receiver_id, content, resp),
            FeedCommand::SignOut { resp } => {
                let identity = self.identity.clone();
                self.spawn(async move {
                    let result = identity.sign_out().await;
                    Completion::SignedOut { result, resp }
                });
            }
            // handled by the run loop
            FeedCommand::Unmount { resp } => {
                let _ = resp.send(());
            }
        }
    }

    fn when_ready(&mut self, resp: Responder<FeedSnapshot>) {
        if self.phase == Phase::Ready {
            let _ = resp.send(self.snapshot());
        } else {
            self.ready_waiters.push(resp);
        }
    }

    fn cursor_moved(&mut self, before: usize, after: usize) {
        if before != after {
            self.comments_open = false;
            self.changed();
        }
    }

    fn start_load(&mut self) {
        self.generation += 1;
        self.phase = Phase::Loading;
        self.posts.begin_load();
        self.changed();

        let generation = self.generation;
        let service = self.service.clone();
        let viewer = self.viewer();
        info!("Loading feed (generation {generation})");
        self.spawn(async move {
            let result = load_batch(service, viewer.clone()).await;
            Completion::Loaded {
                generation,
                viewer,
                result,
            }
        });
    }

    fn like(&mut self, post_id: PostId, resp: Responder<FeedResult<bool>>) {
        let Some(viewer) = self.viewer() else {
            self.notify(Notification::error(
                "Sign in required",
                "You need to be signed in to react to posts.",
            ));
            let _ = resp.send(Err(FeedError::SignedOut.into()));
            return;
        };
        if self.posts.get(&post_id).is_none() {
            let _ = resp.send(Err(FeedError::UnknownPost { post_id }.into()));
            return;
        }
        let from = match self.likes.begin_toggle(&post_id) {
            Ok(from) => from,
            Err(err) => {
                debug!("{err}");
                let _ = resp.send(Err(err));
                return;
            }
        };

        let service = self.service.clone();
        let liked = !from;
        self.spawn(async move {
            let result = likes::write_like(&*service, &viewer, &post_id, liked).await;
            Completion::LikeWritten {
                post_id,
                viewer,
                liked,
                result,
                resp,
            }
        });
    }

    fn toggle_comments(&mut self, post_id: PostId) -> bool {
        self.comments_open = !self.comments_open;
        self.changed();
        if !self.comments_open {
            return false;
        }

        if self.threads.is_loaded(&post_id) {
            self.schedule_focus(post_id);
        } else {
            self.spawn_thread_fetch(post_id, true);
        }
        true
    }

    fn submit_comment(&mut self, post_id: PostId, resp: Responder<FeedResult<Vec<Comment>>>) {
        let Some(text) = comments::normalize(&self.draft).map(str::to_owned) else {
            let _ = resp.send(Err(FeedError::EmptyComment.into()));
            return;
        };
        let Some(viewer) = self.viewer() else {
            self.notify(Notification::error(
                "Sign in required",
                "You need to be signed in to comment.",
            ));
            let _ = resp.send(Err(FeedError::SignedOut.into()));
            return;
        };
        if self.posts.get(&post_id).is_none() {
            let _ = resp.send(Err(FeedError::UnknownPost { post_id }.into()));
            return;
        }

        let submitted = self.draft.clone();
        let service = self.service.clone();
        self.spawn(async move {
            let result = comments::insert_comment(&*service, &viewer, &post_id, &text).await;
            // the refetch only happens once the insert is confirmed
            let thread = match &result {
                Ok(()) => Some(comments::fetch_thread(&*service, &post_id).await),
                Err(_) => None,
            };
            Completion::CommentPosted {
                post_id,
                text: submitted,
                result,
                thread,
                resp,
            }
        });
    }

    fn share(&mut self, post_id: PostId, resp: Responder<FeedResult<String>>) {
        let url = Route::Post(post_id).url(&self.origin);
        let clipboard = self.clipboard.clone();
        self.spawn(async move {
            let result = clipboard.write_text(&url).await;
            Completion::Shared { url, result, resp }
        });
    }

    fn send_message(
        &mut self,
        receiver_id: UserId,
        content: String,
        resp: Responder<FeedResult<Message>>,
    ) {
        if content.trim().is_empty() {
            let _ = resp.send(Err(FeedError::EmptyMessage.into()));
            return;
        }
        let Some(viewer) = self.viewer() else {
            self.notify(Notification::error(
                "Sign in required",
                "You need to be signed in to send messages.",
            ));
            let _ = resp.send(Err(FeedError::SignedOut.into()));
            return;
        };

        let service = self.service.clone();
        self.spawn(async move {
            let result = message::send(&*service, &viewer, &receiver_id, &content).await;
            Completion::MessageSent { result, resp }
        });
    }

    // ***
    // Completions
    // ***

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Loaded {
                generation,
                viewer,
                result,
            } => self.finish_load(generation, viewer, result),
            Completion::Hydrated {
                post_id,
                viewer,
                result,
            } => {
                if !self.hydrating.remove(&post_id) {
                    debug!("Post {post_id} was deleted before it could be shown");
                    return;
                }
                match result {
                    Ok(Some((post, liked))) => {
                        if self.is_viewer(viewer.as_ref()) {
                            self.likes.prime(liked);
                        }
                        if self.posts.apply_remote_insert(post) {
                            info!("New post {post_id} added to the feed");
                            self.changed();
                        }
                    }
                    Ok(None) => debug!("Post {post_id} is no longer active"),
                    Err(err) => warn!("Unable to fetch new post {post_id}: {err}"),
                }
            }
            Completion::ThreadFetched {
                post_id,
                result,
                focus,
            } => match result {
                Ok(thread) => {
                    self.threads.store(post_id.clone(), thread);
                    self.changed();
                    if focus {
                        self.schedule_focus(post_id);
                    }
                }
                Err(err) => warn!("Unable to load comments for {post_id}: {err}"),
            },
            Completion::LikeWritten {
                post_id,
                viewer,
                liked,
                result,
                resp,
            } => match result {
                Ok(()) if !self.is_viewer(Some(&viewer)) => {
                    // written for a viewer who has since signed out
                    self.likes.finish_toggle(&post_id, None);
                    debug!("Not caching like on {post_id} for {viewer}");
                    let _ = resp.send(Ok(liked));
                }
                Ok(()) => {
                    self.likes.finish_toggle(&post_id, Some(liked));
                    self.changed();
                    let message = if liked {
                        "Added to your likes."
                    } else {
                        "Removed from your likes."
                    };
                    self.notify(Notification::success("Reaction saved", message));
                    let _ = resp.send(Ok(liked));
                }
                Err(err) => {
                    self.likes.finish_toggle(&post_id, None);
                    error!("Unable to update like on {post_id}: {err}");
                    self.notify(Notification::error(
                        "Could not process your reaction",
                        TRY_AGAIN,
                    ));
                    let _ = resp.send(Err(err));
                }
            },
            Completion::CommentPosted {
                post_id,
                text,
                result,
                thread,
                resp,
            } => {
                if let Err(err) = result {
                    error!("Unable to post comment on {post_id}: {err}");
                    self.notify(Notification::error("Could not post your comment", TRY_AGAIN));
                    let _ = resp.send(Err(err));
                    return;
                }
                // keep anything typed since the submit
                if self.draft == text {
                    self.draft.clear();
                }
                match thread {
                    Some(Ok(thread)) => self.threads.store(post_id.clone(), thread),
                    Some(Err(err)) => warn!("Unable to refresh comments for {post_id}: {err}"),
                    None => {}
                }
                self.changed();
                self.notify(Notification::success(
                    "Comment posted",
                    "Your comment was added.",
                ));
                let thread = self.threads.get(&post_id).cloned().unwrap_or_default();
                let _ = resp.send(Ok(thread));
            }
            Completion::Shared { url, result, resp } => match result {
                Ok(()) => {
                    self.notify(Notification::success(
                        "Link copied",
                        "The post link is on your clipboard.",
                    ));
                    let _ = resp.send(Ok(url));
                }
                Err(err) => {
                    error!("Unable to copy {url}: {err}");
                    self.notify(Notification::error("Could not copy the link", TRY_AGAIN));
                    let _ = resp.send(Err(err));
                }
            },
            Completion::MessageSent { result, resp } => {
                match &result {
                    Ok(message) => {
                        debug!("Message {} sent", message.id);
                        self.notify(Notification::success(
                            "Message sent",
                            "Your message is on its way.",
                        ));
                    }
                    Err(err) => {
                        error!("Unable to send message: {err}");
                        self.notify(Notification::error(
                            "Could not send your message",
                            TRY_AGAIN,
                        ));
                    }
                }
                let _ = resp.send(result);
            }
            Completion::SignedOut { result, resp } => {
                match &result {
                    Ok(()) => {
                        self.likes.clear();
                        self.draft.clear();
                        self.comments_open = false;
                        self.changed();
                        self.emit(FeedEvent::Navigate(Route::Home));
                    }
                    Err(err) => {
                        error!("Sign out failed: {err}");
                        self.notify(Notification::error("Could not sign out", TRY_AGAIN));
                    }
                }
                let _ = resp.send(result);
            }
        }
    }

    fn finish_load(
        &mut self,
        generation: u64,
        viewer: Option<UserId>,
        result: FeedResult<LoadedBatch>,
    ) {
        if generation != self.generation {
            debug!("Discarding stale load (generation {generation})");
            return;
        }
        match result {
            Ok(batch) => {
                self.posts.finish_load(batch.posts);
                if self.is_viewer(viewer.as_ref()) {
                    self.likes.prime(batch.liked);
                }
                for (post_id, thread) in batch.threads {
                    self.threads.store(post_id, thread);
                }
                self.load_error = false;
                info!("Feed ready with {} posts", self.posts.size());
            }
            Err(err) => {
                self.posts.abort_load();
                self.load_error = true;
                error!("Unable to load posts: {err}");
                self.notify(Notification::error("Could not load posts", TRY_AGAIN));
            }
        }
        self.phase = Phase::Ready;
        self.changed();

        let snapshot = self.snapshot();
        for waiter in self.ready_waiters.drain(..) {
            let _ = waiter.send(snapshot.clone());
        }
    }

    // ***
    // Change feed
    // ***

    fn handle_change(&mut self, event: ChangeEvent) {
        if self.phase == Phase::Uninitialized || event.table != Table::Posts {
            return;
        }
        let Some(post_id) = event.row_id().map(str::to_owned) else {
            warn!("Change event without an id: {:?}", event.kind);
            return;
        };
        match event.kind {
            ChangeKind::Insert => {
                if self.posts.get(&post_id).is_some() || !self.hydrating.insert(post_id.clone()) {
                    return;
                }
                debug!("Realtime insert for {post_id}");
                let service = self.service.clone();
                let viewer = self.viewer();
                self.spawn(async move {
                    let result = hydrate(service, viewer.clone(), &post_id).await;
                    Completion::Hydrated {
                        post_id,
                        viewer,
                        result,
                    }
                });
            }
            ChangeKind::Delete => {
                debug!("Realtime delete for {post_id}");
                self.hydrating.remove(&post_id);
                if self.posts.apply_remote_delete(&post_id) {
                    self.threads.evict(&post_id);
                    self.likes.forget(&post_id);
                    self.changed();
                }
            }
            ChangeKind::Update => debug!("Ignoring update for {post_id}"),
        }
    }

    // ***
    // Helpers
    // ***

    fn spawn_thread_fetch(&mut self, post_id: PostId, focus: bool) {
        let service = self.service.clone();
        self.spawn(async move {
            let result = comments::fetch_thread(&*service, &post_id).await;
            Completion::ThreadFetched {
                post_id,
                result,
                focus,
            }
        });
    }

    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        let done = self.done.clone();
        tokio::spawn(async move {
            // fails only once the session is gone; the result is dropped
            let _ = done.send(task.await);
        });
    }

    fn schedule_focus(&self, post_id: PostId) {
        let events = self.events.clone();
        let delay = self.focus_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(FeedEvent::FocusCommentInput(post_id));
        });
    }

    fn viewer(&self) -> Option<UserId> {
        self.identity.current_user().map(|viewer| viewer.id)
    }

    /// Like state fetched or written for `issued_for` only belongs in the
    /// cache while that user is still the viewer.
    fn is_viewer(&self, issued_for: Option<&UserId>) -> bool {
        self.viewer().as_ref() == issued_for
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            phase: self.phase,
            load_error: self.load_error,
            posts: self.posts.posts().to_vec(),
            index: self.posts.index(),
            comments_open: self.comments_open,
            draft: self.draft.clone(),
            threads: self.threads.as_map().clone(),
            liked: self.likes.as_map().clone(),
        }
    }

    fn notify(&self, notification: Notification) {
        self.emit(FeedEvent::Notify(notification));
    }

    fn changed(&self) {
        self.emit(FeedEvent::Changed);
    }

    fn emit(&self, event: FeedEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Fetch the active posts, then prime likes and comment threads for all of
/// them concurrently.
async fn load_batch(
    service: Arc<dyn DataService>,
    viewer: Option<UserId>,
) -> FeedResult<LoadedBatch> {
    let posts = stream::fetch_active(&*service, Utc::now()).await?;
    let ids: Vec<PostId> = posts.iter().map(|post| post.id.clone()).collect();

    let like_states = likes::fetch_like_states(&*service, viewer.as_ref(), &ids);
    let threads = join_all(ids.iter().map(|id| {
        let service = service.clone();
        async move { (id.clone(), comments::fetch_thread(&*service, id).await) }
    }));
    let (liked, threads) = tokio::join!(like_states, threads);

    let liked = liked.unwrap_or_else(|err| {
        warn!("Unable to check likes: {err}");
        HashMap::new()
    });
    let threads = threads
        .into_iter()
        .filter_map(|(post_id, result)| match result {
            Ok(thread) => Some((post_id, thread)),
            Err(err) => {
                warn!("Unable to load comments for {post_id}: {err}");
                None
            }
        })
        .collect();

    Ok(LoadedBatch {
        posts,
        liked,
        threads,
    })
}

/// Turn a bare change-feed row into a full post with its author and the
/// viewer's like state.
async fn hydrate(
    service: Arc<dyn DataService>,
    viewer: Option<UserId>,
    post_id: &str,
) -> FeedResult<Option<(Post, HashMap<PostId, bool>)>> {
    let Some(post) = stream::fetch_post(&*service, post_id, Utc::now()).await? else {
        return Ok(None);
    };
    let liked = likes::fetch_like_states(&*service, viewer.as_ref(), &[post.id.clone()]).await?;
    Ok(Some((post, liked)))
}

/// Cloneable handle to a mounted feed session. Every operation reports its
/// outcome; failures have already been logged and, where the user needs to
/// know, announced as a [`FeedEvent::Notify`].
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedHandle {
    async fn request<T>(&self, make: impl FnOnce(Responder<T>) -> FeedCommand) -> FeedResult<T> {
        let (resp, receiver) = oneshot::channel();
        self.commands
            .send(make(resp))
            .await
            .map_err(|_| FeedError::SessionClosed)?;
        receiver
            .await
            .map_err(|_| FeedError::SessionClosed.into())
    }

    /// Subscribe to state changes, notifications and navigation requests.
    pub fn events(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> FeedResult<FeedSnapshot> {
        self.request(|resp| FeedCommand::Snapshot { resp }).await
    }

    /// Wait until the current load has finished, successfully or not.
    pub async fn ready(&self) -> FeedResult<FeedSnapshot> {
        self.request(|resp| FeedCommand::WhenReady { resp }).await
    }

    /// Fetch the feed again, merging with what the change feed delivered.
    pub async fn reload(&self) -> FeedResult<FeedSnapshot> {
        self.request(|resp| FeedCommand::Reload { resp }).await
    }

    pub async fn next(&self) -> FeedResult<usize> {
        self.request(|resp| FeedCommand::Next { resp }).await
    }

    pub async fn previous(&self) -> FeedResult<usize> {
        self.request(|resp| FeedCommand::Previous { resp }).await
    }

    /// Toggle the viewer's like; resolves to the confirmed new state.
    pub async fn like(&self, post_id: &str) -> FeedResult<bool> {
        let post_id = post_id.to_owned();
        self.request(|resp| FeedCommand::Like { post_id, resp })
            .await?
    }

    /// Open or close the comment panel; resolves to whether it is now open.
    pub async fn toggle_comments(&self, post_id: &str) -> FeedResult<bool> {
        let post_id = post_id.to_owned();
        self.request(|resp| FeedCommand::ToggleComments { post_id, resp })
            .await
    }

    pub async fn set_draft(&self, text: impl Into<String>) -> FeedResult<()> {
        self.commands
            .send(FeedCommand::SetDraft { text: text.into() })
            .await
            .map_err(|_| FeedError::SessionClosed.into())
    }

    /// Submit the current draft as a comment on `post_id`; resolves to the
    /// refreshed thread.
    pub async fn submit_comment(&self, post_id: &str) -> FeedResult<Vec<Comment>> {
        let post_id = post_id.to_owned();
        self.request(|resp| FeedCommand::SubmitComment { post_id, resp })
            .await?
    }

    pub async fn comment(&self, post_id: &str, text: &str) -> FeedResult<Vec<Comment>> {
        self.set_draft(text).await?;
        self.submit_comment(post_id).await
    }

    /// Copy the post's link to the clipboard and return it.
    pub async fn share(&self, post_id: &str) -> FeedResult<String> {
        let post_id = post_id.to_owned();
        self.request(|resp| FeedCommand::Share { post_id, resp })
            .await?
    }

    pub async fn send_message(&self, receiver_id: &str, content: &str) -> FeedResult<Message> {
        let receiver_id = receiver_id.to_owned();
        let content = content.to_owned();
        self.request(|resp| FeedCommand::SendMessage {
            receiver_id,
            content,
            resp,
        })
        .await?
    }

    pub async fn sign_out(&self) -> FeedResult<()> {
        self.request(|resp| FeedCommand::SignOut { resp }).await?
    }

    /// Close the subscription and stop the session. Results still in
    /// flight are discarded.
    pub async fn unmount(&self) -> FeedResult<()> {
        self.request(|resp| FeedCommand::Unmount { resp }).await
    }

    pub fn go_to_create(&self) -> Route {
        self.navigate(Route::Create)
    }

    pub fn go_to_profile(&self, user_id: &str) -> Route {
        self.navigate(Route::Profile(user_id.to_owned()))
    }

    pub fn go_to_messages(&self) -> Route {
        self.navigate(Route::Messages)
    }

    pub fn go_to_home(&self) -> Route {
        self.navigate(Route::Home)
    }

    fn navigate(&self, route: Route) -> Route {
        let _ = self.events.send(FeedEvent::Navigate(route.clone()));
        route
    }
}

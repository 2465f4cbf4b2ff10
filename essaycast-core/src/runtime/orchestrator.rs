use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::language::LanguageDescriptor;
use crate::pipeline::PromptRecord;
use crate::pipeline::request::{GenerationRequest, ImageModel};
use crate::pipeline::segmenter::{EssayPortion, segment};
use crate::pipeline::timeline::TimelineComposer;
use crate::runtime::stage::{self, COMPLETED_LABEL, COMPLETED_PROGRESS, Stage};
use crate::runtime::storage::TaskStore;
use crate::runtime::types::{RuntimeError, TaskId, TaskState, TaskStatus};
use crate::services::{EssayRequest, Services, SpeechTrack};

/// File name the compositor writes before finalize renames it.
pub const COMPOSED_FILE_NAME: &str = "output.mp4";

/// Commands sent to the orchestrator's internal event loop.
#[derive(Debug)]
pub(crate) enum OrchestratorCommand {
    /// Admit an already-validated request.
    Submit {
        request: GenerationRequest,
        language: LanguageDescriptor,
        /// Channel used to return the allocated `TaskId` to the caller.
        reply_tx: oneshot::Sender<TaskId>,
    },
}

/// The generation orchestrator.
///
/// Validates requests, records them in a [`TaskStore`] and drives each task
/// through research, essay, prompts, speech, images, compose and finalize.
/// Tasks run independently of each other and share nothing but the store;
/// within a task, prompt and image calls are bounded by `image_concurrency`.
///
/// # Usage
///
/// ```rust,ignore
/// let orchestrator = Orchestrator::start(services, Config::default());
/// let task_id = orchestrator.submit(GenerationRequest::new("ocean currents")).await?;
/// let state = orchestrator.poll(task_id).await?;
/// ```
#[derive(Clone, Debug)]
pub struct Orchestrator {
    ctx: Arc<PipelineContext>,
    submit_tx: mpsc::Sender<OrchestratorCommand>,
}

#[derive(Debug)]
struct PipelineContext {
    services: Services,
    config: Config,
    store: TaskStore,
    composer: TimelineComposer,
}

fn upstream<E: Display>(stage: Stage) -> impl FnOnce(E) -> RuntimeError {
    move |e| RuntimeError::Upstream {
        stage: stage.to_string(),
        message: e.to_string(),
    }
}

impl Orchestrator {
    /// Start the orchestrator with a fresh [`TaskStore`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(services: Services, config: Config) -> Self {
        Self::with_store(services, config, TaskStore::new())
    }

    /// Start the orchestrator on an existing store.
    pub fn with_store(services: Services, config: Config, store: TaskStore) -> Self {
        let (submit_tx, submit_rx) = mpsc::channel(config.queue_capacity.max(1));
        let composer = TimelineComposer::new(
            Arc::clone(&services.compositor),
            config.fps,
            config.frame_size,
            config.degenerate_policy,
        );
        let ctx = Arc::new(PipelineContext {
            services,
            config,
            store,
            composer,
        });

        let loop_ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            Self::run_loop(submit_rx, loop_ctx).await;
        });

        Self { ctx, submit_tx }
    }

    /// Internal event loop: admits submissions and spawns their pipelines.
    async fn run_loop(mut rx: mpsc::Receiver<OrchestratorCommand>, ctx: Arc<PipelineContext>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                OrchestratorCommand::Submit {
                    request,
                    language,
                    reply_tx,
                } => {
                    let task_id = ctx.store.create().await;
                    info!(%task_id, topic = %request.topic, language = language.code, "task queued");
                    if reply_tx.send(task_id).is_err() {
                        warn!(%task_id, "submitter went away before receiving the task id");
                    }

                    let task_ctx = Arc::clone(&ctx);
                    tokio::spawn(async move {
                        // The outcome is already recorded in the store.
                        let _ = task_ctx.execute_task(task_id, request, language).await;
                    });
                }
            }
        }
        debug!("orchestrator loop stopped");
    }

    // ── Public API ───────────────────────────────────────────────────────────

    /// Validate and enqueue a request.
    ///
    /// Returns the new [`TaskId`] as soon as the task is recorded; the
    /// pipeline runs in the background. Invalid requests are rejected here
    /// and never reach the store.
    pub async fn submit(&self, request: GenerationRequest) -> Result<TaskId, RuntimeError> {
        let language = request.validate(self.ctx.config.max_images)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.submit_tx
            .try_send(OrchestratorCommand::Submit {
                request,
                language,
                reply_tx,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => RuntimeError::OrchestratorQueueFull {
                    capacity: self.submit_tx.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => RuntimeError::Shutdown,
            })?;

        reply_rx.await.map_err(|_| RuntimeError::Shutdown)
    }

    /// Validate a request and run it to completion on the current task.
    ///
    /// The task is still recorded in the store, so it can be polled from
    /// elsewhere while this future is pending.
    pub async fn run(&self, request: GenerationRequest) -> Result<PathBuf, RuntimeError> {
        let language = request.validate(self.ctx.config.max_images)?;
        let task_id = self.ctx.store.create().await;
        info!(%task_id, topic = %request.topic, language = language.code, "task started");
        self.ctx.execute_task(task_id, request, language).await
    }

    /// Snapshot of a task's state.
    pub async fn poll(&self, task_id: TaskId) -> Result<TaskState, RuntimeError> {
        self.ctx
            .store
            .get(task_id)
            .await
            .ok_or(RuntimeError::TaskNotFound { task_id })
    }

    /// Path of a completed task's video.
    ///
    /// Fails with [`RuntimeError::NotCompleted`] unless the task completed and
    /// with [`RuntimeError::ArtifactMissing`] if it did but the file is gone.
    pub async fn fetch_artifact(&self, task_id: TaskId) -> Result<PathBuf, RuntimeError> {
        let state = self.poll(task_id).await?;
        if state.status != TaskStatus::Completed {
            return Err(RuntimeError::NotCompleted {
                task_id,
                status: state.status,
            });
        }
        let path = self.ctx.artifact_path(task_id);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            error!(%task_id, path = %path.display(), "completed task has no artifact");
            return Err(RuntimeError::ArtifactMissing { task_id, path });
        }
        Ok(path)
    }

    /// All known tasks, oldest first.
    pub async fn list(&self) -> Vec<(TaskId, TaskState)> {
        self.ctx.store.list().await
    }

    pub fn store(&self) -> &TaskStore {
        &self.ctx.store
    }

    pub fn config(&self) -> &Config {
        &self.ctx.config
    }
}

impl PipelineContext {
    fn task_dir(&self, task_id: TaskId) -> PathBuf {
        self.config.output_root.join(task_id.to_string())
    }

    fn artifact_path(&self, task_id: TaskId) -> PathBuf {
        self.task_dir(task_id).join(format!("{task_id}.mp4"))
    }

    /// Run the pipeline and record its outcome.
    ///
    /// This is the single place where stage failures are turned into a
    /// `Failed` task state.
    async fn execute_task(
        &self,
        task_id: TaskId,
        request: GenerationRequest,
        language: LanguageDescriptor,
    ) -> Result<PathBuf, RuntimeError> {
        match self.drive(task_id, &request, language).await {
            Ok(path) => {
                info!(%task_id, path = %path.display(), "task completed");
                Ok(path)
            }
            Err(err) => {
                error!(%task_id, error = %err, "video generation failed");
                if let Err(store_err) = self.store.fail(task_id, err.to_string()).await {
                    warn!(%task_id, error = %store_err, "could not record failure");
                }
                Err(err)
            }
        }
    }

    async fn advance(&self, task_id: TaskId, stage: Stage) -> Result<(), RuntimeError> {
        self.set_step(task_id, stage.label(), stage.progress()).await
    }

    async fn set_step(
        &self,
        task_id: TaskId,
        step: impl Into<String>,
        progress: f32,
    ) -> Result<(), RuntimeError> {
        let state = self
            .store
            .update(task_id, TaskStatus::Processing, step, progress)
            .await?;
        info!(%task_id, step = %state.current_step, progress = state.progress, "status updated");
        Ok(())
    }

    async fn drive(
        &self,
        task_id: TaskId,
        request: &GenerationRequest,
        language: LanguageDescriptor,
    ) -> Result<PathBuf, RuntimeError> {
        // Leave `Queued` before anything can fail.
        let research = self
            .services
            .research
            .as_ref()
            .filter(|_| request.use_web_search);
        let first = if research.is_some() {
            Stage::Research
        } else {
            Stage::Essay
        };
        self.advance(task_id, first).await?;

        let workdir = self.task_dir(task_id);
        tokio::fs::create_dir_all(&workdir).await?;

        let notes = match research {
            Some(research) => {
                let notes = research
                    .research(&request.topic, language)
                    .await
                    .map_err(upstream(Stage::Research))?;
                self.advance(task_id, Stage::Essay).await?;
                Some(notes)
            }
            None => None,
        };

        let essay = self.essay(request, language, notes.as_deref()).await?;
        let portions = segment(&essay, request.num_images);
        debug!(%task_id, chars = essay.chars().count(), portions = portions.len(), "essay segmented");

        self.advance(task_id, Stage::Prompts).await?;
        let (prompts, speech) = if self.config.overlap_speech {
            let prompts = async move {
                let prompts = self.prompts(portions, language).await?;
                self.advance(task_id, Stage::Speech).await?;
                Ok::<_, RuntimeError>(prompts)
            };
            tokio::try_join!(prompts, self.speech(&essay, language, &workdir))?
        } else {
            let prompts = self.prompts(portions, language).await?;
            self.advance(task_id, Stage::Speech).await?;
            (prompts, self.speech(&essay, language, &workdir).await?)
        };

        self.advance(task_id, Stage::Images).await?;
        let pairs = self
            .images(task_id, prompts, request.image_model, &workdir)
            .await?;

        self.advance(task_id, Stage::Compose).await?;
        debug!(%task_id, clips = pairs.len(), "composing video");
        let composed = self
            .composer
            .compose(pairs, speech, workdir.join(COMPOSED_FILE_NAME))
            .await
            .map_err(upstream(Stage::Compose))?;

        self.advance(task_id, Stage::Finalize).await?;
        let final_path = self.artifact_path(task_id);
        tokio::fs::rename(&composed, &final_path)
            .await
            .map_err(upstream(Stage::Finalize))?;

        self.store
            .update(task_id, TaskStatus::Completed, COMPLETED_LABEL, COMPLETED_PROGRESS)
            .await?;
        Ok(final_path)
    }

    async fn essay(
        &self,
        request: &GenerationRequest,
        language: LanguageDescriptor,
        notes: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let essay = self
            .services
            .content
            .essay(EssayRequest {
                topic: &request.topic,
                target_word_count: request.video_length.target_word_count(),
                model: request.text_model,
                language,
                research: notes,
            })
            .await
            .map_err(upstream(Stage::Essay))?;
        if essay.trim().is_empty() {
            return Err(upstream(Stage::Essay)("content service returned an empty essay"));
        }
        Ok(essay)
    }

    /// One prompt per portion, in portion order.
    async fn prompts(
        &self,
        portions: Vec<EssayPortion>,
        language: LanguageDescriptor,
    ) -> Result<Vec<PromptRecord>, RuntimeError> {
        stream::iter(portions)
            .map(|portion| async move {
                debug!(position = portion.position, "generating image prompt");
                let prompt = self
                    .services
                    .content
                    .image_prompt(&portion.text, language)
                    .await
                    .map_err(upstream(Stage::Prompts))?;
                Ok::<_, RuntimeError>(PromptRecord {
                    prompt,
                    position: portion.position,
                })
            })
            .buffered(self.config.image_concurrency.max(1))
            .try_collect()
            .await
    }

    async fn speech(
        &self,
        essay: &str,
        language: LanguageDescriptor,
        workdir: &Path,
    ) -> Result<SpeechTrack, RuntimeError> {
        self.services
            .speech
            .synthesize(essay, language.code, workdir)
            .await
            .map_err(upstream(Stage::Speech))
    }

    /// Render every prompt, up to `image_concurrency` at a time.
    ///
    /// Returns `(image, position)` pairs ordered by prompt index; each image
    /// keeps the position of the prompt it was rendered from.
    async fn images(
        &self,
        task_id: TaskId,
        prompts: Vec<PromptRecord>,
        model: ImageModel,
        workdir: &Path,
    ) -> Result<Vec<(PathBuf, f64)>, RuntimeError> {
        let total = prompts.len();
        let mut rendered: Vec<(usize, PathBuf, f64)> = Vec::with_capacity(total);

        let mut pending = stream::iter(prompts.into_iter().enumerate())
            .map(|(index, record)| async move {
                debug!(index, position = record.position, "rendering image");
                let path = self
                    .services
                    .images
                    .render(&record.prompt, model, index, workdir)
                    .await
                    .map_err(upstream(Stage::Images))?;
                Ok::<_, RuntimeError>((index, path, record.position))
            })
            .buffer_unordered(self.config.image_concurrency.max(1));

        while let Some(result) = pending.next().await {
            rendered.push(result?);
            let done = rendered.len();
            self.set_step(
                task_id,
                stage::image_label(done, total),
                stage::image_progress(done, total),
            )
            .await?;
        }

        rendered.sort_by_key(|(index, _, _)| *index);
        Ok(rendered
            .into_iter()
            .map(|(_, path, position)| (path, position))
            .collect())
    }
}

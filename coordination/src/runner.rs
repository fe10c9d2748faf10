//! Interaction runner - logged round trips to participants and the scheduler.
//!
//! Every primitive appends its request before suspending and its response
//! after resuming, so the log records each boundary crossing in the order
//! it happened.

use std::sync::Arc;

use tracing::debug;

use crate::error::{DebateError, DebateResult};
use crate::events::{
    LogEntry, Participant, Prompt, Response, RoleHint, SchedulerMessage, SchedulerReply,
    SharedInteractionLog, Template,
};
use crate::responders::Responder;
use crate::scheduler::SharedScheduler;

pub struct InteractionRunner {
    log: SharedInteractionLog,
    scheduler: SharedScheduler,
    responder: Arc<dyn Responder>,
}

impl InteractionRunner {
    pub fn new(
        log: SharedInteractionLog,
        scheduler: SharedScheduler,
        responder: Arc<dyn Responder>,
    ) -> Self {
        Self {
            log,
            scheduler,
            responder,
        }
    }

    pub fn log(&self) -> &SharedInteractionLog {
        &self.log
    }

    pub fn scheduler(&self) -> &SharedScheduler {
        &self.scheduler
    }

    /// Ask a participant and await the response
    pub async fn interact(
        &self,
        participant: &Participant,
        template: Template,
        payload: Prompt,
    ) -> DebateResult<Response> {
        let index = self.log.append(LogEntry::InteractRequest {
            participant: participant.clone(),
            template,
            payload: payload.clone(),
        });
        debug!(index, participant = %participant, %template, "Interaction requested");

        let response = self
            .responder
            .respond(participant, template, index, &payload)
            .await?;

        self.log.append(LogEntry::InteractResponse {
            request_index: index,
            response: response.clone(),
        });
        debug!(index, %response, "Interaction answered");
        Ok(response)
    }

    /// Ask the scheduler and await its decision
    pub async fn send_scheduler(&self, message: SchedulerMessage) -> DebateResult<SchedulerReply> {
        let index = self.log.append(LogEntry::SchedulerRequest {
            is_async: false,
            message: message.clone(),
        });
        debug!(index, message = message.kind(), "Scheduler request");

        let reply = self.scheduler.handle(message).await?;

        self.log.append(LogEntry::SchedulerResponse {
            request_index: index,
            response: reply.clone(),
        });
        Ok(reply)
    }

    /// Log a state-update notification and apply it without a response entry
    pub fn send_scheduler_async(&self, message: SchedulerMessage) -> DebateResult<()> {
        if !message.is_notification() {
            return Err(DebateError::NotANotification(message.kind()));
        }

        let index = self.log.append(LogEntry::SchedulerRequest {
            is_async: true,
            message: message.clone(),
        });
        debug!(index, message = message.kind(), "Scheduler notification");
        self.scheduler.notify(message)
    }

    /// Obtain a participant for a role
    pub async fn allocate(&self, hint: RoleHint) -> DebateResult<Participant> {
        match self.send_scheduler(SchedulerMessage::Allocate { hint }).await? {
            SchedulerReply::Allocated { participant } => Ok(participant),
            other => Err(DebateError::UnexpectedSchedulerReply(other)),
        }
    }
}

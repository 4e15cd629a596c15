// ABOUTME: StepStreamState - merges normalized deltas into one message and
// ABOUTME: reports each applied fragment as a StepStreamEvent.

use std::collections::{BTreeMap, BTreeSet};

use crate::message::{Message, MessageContent, MessageDelta, ToolCall, ToolCallDelta, role};

use super::StepStreamEvent;

/// Accumulating state for one streamed step.
///
/// Local to a single decode; never shared between streams. All mutation goes
/// through [`apply_delta`](Self::apply_delta) and [`finalize`](Self::finalize),
/// which return the events describing what changed.
#[derive(Debug, Default)]
pub struct StepStreamState {
    message: Message,
    tool_calls: BTreeMap<usize, ToolCall>,
    announced: BTreeSet<usize>,
}

impl StepStreamState {
    /// Create an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The message accumulated so far. Tool calls are attached on finalize.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Mutable access for mapper side channels such as extra namespaces.
    pub fn message_mut(&mut self) -> &mut Message {
        &mut self.message
    }

    /// Number of tool calls materialized so far.
    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.len()
    }

    /// Apply one delta and return the events it produced, in rule order.
    pub fn apply_delta(&mut self, delta: MessageDelta) -> Vec<StepStreamEvent> {
        let mut events = Vec::new();

        if let Some(r) = delta.role.filter(|r| !r.is_empty() && *r != self.message.role) {
            self.message.role = r.clone();
            events.push(StepStreamEvent::Role { role: r });
        }

        if let Some(fragment) = delta.content.filter(|c| !c.is_empty()) {
            self.message.content.concat_into(fragment.clone());
            events.push(StepStreamEvent::ContentDelta { delta: fragment });
        }

        if let Some(fragment) = delta.reasoning.filter(|c| !c.is_empty()) {
            append(&mut self.message.reasoning, fragment.clone());
            events.push(StepStreamEvent::ReasoningDelta { delta: fragment });
        }

        if let Some(fragment) = delta.refusal.filter(|c| !c.is_empty()) {
            append(&mut self.message.refusal, fragment.clone());
            events.push(StepStreamEvent::RefusalDelta { delta: fragment });
        }

        for tc in delta.tool_calls.unwrap_or_default() {
            self.apply_tool_call(tc, &mut events);
        }

        events
    }

    fn apply_tool_call(&mut self, delta: ToolCallDelta, events: &mut Vec<StepStreamEvent>) {
        let index = delta.index;
        let call = self.tool_calls.entry(index).or_default();

        if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        if let Some(call_id) = delta.call_id.filter(|id| !id.is_empty()) {
            call.call_id = Some(call_id);
        }
        if let Some(name) = &delta.name {
            call.name.push_str(name);
        }
        if let Some(args) = &delta.arguments {
            call.arguments.push_str(args);
        }

        if !call.name.is_empty() && self.announced.insert(index) {
            events.push(StepStreamEvent::ToolCallStart {
                index,
                id: call.id.clone(),
                name: call.name.clone(),
            });
        }

        if let Some(args) = delta.arguments.filter(|a| !a.is_empty()) {
            events.push(StepStreamEvent::ToolCallDelta { index, delta: args });
        }
    }

    /// Close every tool call in ascending index order and produce the message.
    pub fn finalize(mut self) -> (Vec<StepStreamEvent>, Message) {
        let mut events = Vec::with_capacity(self.tool_calls.len());
        let mut calls = Vec::with_capacity(self.tool_calls.len());

        for (index, call) in self.tool_calls {
            events.push(StepStreamEvent::ToolCallEnd {
                index,
                tool_call: call.clone(),
            });
            calls.push(call);
        }

        if !calls.is_empty() {
            self.message.tool_calls = Some(calls);
        }
        if self.message.role.is_empty() {
            self.message.role = role::ASSISTANT.to_string();
        }

        (events, self.message)
    }
}

fn append(slot: &mut Option<MessageContent>, fragment: MessageContent) {
    match slot {
        Some(existing) => existing.concat_into(fragment),
        None => *slot = Some(fragment),
    }
}

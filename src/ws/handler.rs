use super::{ClientMessage, Endpoint, Role, ServerMessage};
use crate::error::HubError;
use crate::quiz::QuizService;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Drive one websocket connection until either side goes away.
///
/// The socket is split: a writer task drains the endpoint's outbound queue,
/// while this task reads client messages and dispatches them by role.
pub async fn serve_socket(
    socket: WebSocket,
    quiz: Arc<QuizService>,
    role: Role,
    session_id: String,
) {
    let (mut sink, mut stream) = socket.split();
    let (endpoint, mut outbound) = Endpoint::channel(role);
    let endpoint_id = endpoint.id;

    if let Err(e) = quiz.connect(&session_id, endpoint.clone()).await {
        warn!(
            "Rejecting {} connection to session {}: {}",
            role, session_id, e
        );
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: Cow::from("Session not found"),
        };
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Failed to send close frame: {}", e);
        }
        return;
    }

    info!(
        "{} endpoint {} connected to session {}",
        role, endpoint_id, session_id
    );

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(message.as_ref()) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {}: {}", message.kind(), e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!("WebSocket error on endpoint {}: {}", endpoint_id, e);
                break;
            }
        };

        let message = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Invalid message from endpoint {}: {}", endpoint_id, e);
                reply(&endpoint, ServerMessage::error("Invalid message format"));
                continue;
            }
        };

        dispatch(&quiz, &session_id, &endpoint, message).await;
    }

    quiz.leave(&session_id, endpoint_id).await;
    drop(endpoint);
    writer.abort();

    info!(
        "{} endpoint {} disconnected from session {}",
        role, endpoint_id, session_id
    );
}

fn reply(endpoint: &Endpoint, message: ServerMessage) {
    if !endpoint.send(Arc::new(message)) {
        debug!("Endpoint {} is gone, dropping reply", endpoint.id);
    }
}

async fn dispatch(
    quiz: &Arc<QuizService>,
    session_id: &str,
    endpoint: &Endpoint,
    message: ClientMessage,
) {
    match (endpoint.role, message) {
        (Role::Student, ClientMessage::StudentName { name }) => {
            if let Err(e) = quiz.join(session_id, endpoint.clone(), &name).await {
                warn!("Join failed in session {}: {}", session_id, e);
            }
        }

        (Role::Student, ClientMessage::AnswerSubmission { data }) => {
            match quiz.submit_answer(session_id, endpoint.id, &data).await {
                Ok(_) => {}
                Err(HubError::QuestionNotFound(question_id)) => {
                    warn!(
                        "Answer for unknown question {} in session {}",
                        question_id, session_id
                    );
                    reply(endpoint, ServerMessage::error("Question not found"));
                }
                Err(HubError::DuplicateAnswer { .. }) => {
                    reply(endpoint, ServerMessage::error("Answer already submitted"));
                }
                Err(e) => warn!("Answer rejected in session {}: {}", session_id, e),
            }
        }

        (Role::Lecturer, ClientMessage::TranscriptChunk { chunk, timestamp }) => {
            reply(
                endpoint,
                ServerMessage::TranscriptReceived {
                    chunk_length: chunk.chars().count(),
                    timestamp,
                },
            );

            // Generation can take seconds; keep reading this socket meanwhile.
            let quiz = Arc::clone(quiz);
            let session_id = session_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = quiz.handle_transcript_chunk(&session_id, &chunk).await {
                    warn!("Transcript chunk not turned into questions: {}", e);
                }
            });
        }

        (Role::Lecturer, ClientMessage::EndSession) => {
            if let Err(e) = quiz.end_session(session_id).await {
                error!("Failed to end session {}: {}", session_id, e);
            }
        }

        (role, _) => {
            warn!(
                "Ignoring message not meant for a {} from endpoint {}",
                role, endpoint.id
            );
        }
    }
}

//! WebSocket session stream (spec §6 "WebSocket streams session events
//! typed by the emit callback"), grounded in `kernel_turn`'s/`kernel_planner`'s
//! `emit(event, payload)` hook and `ui/server.py`'s per-connection loop.
//!
//! One message in, one `{"event": "turn_end", ...}`-shaped message out per
//! internal step, ending with a `{"event": "reply", "text": ...}` message
//! once the turn settles. Every event captured during a `step`/`run_goal`
//! call is buffered synchronously (the emit callback itself cannot await)
//! and flushed to the socket once the call returns.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde_json::{json, Value};

use crate::handlers::SharedServer;

/// `GET /sessions/:id/ws`: upgrade to a WebSocket streaming turn/planner events.
pub async fn session_ws(
    ws: WebSocketUpgrade,
    State(server): State<SharedServer>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, server, session_id))
}

async fn handle_socket(mut socket: WebSocket, server: SharedServer, session_id: String) {
    if server.app.ensure_session(&session_id).await.is_err() {
        let _ = socket.send(Message::Text(json!({"event": "error", "message": "could not open session"}).to_string())).await;
        return;
    }

    while let Some(Ok(msg)) = socket.recv().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let request: Value = serde_json::from_str(&text).unwrap_or(json!({"kind": "chat", "text": text}));
        let kind = request.get("kind").and_then(Value::as_str).unwrap_or("chat");

        let mut events: Vec<Value> = Vec::new();
        let mut sink = |name: &str, payload: Value| events.push(json!({"event": name, "payload": payload}));

        let mut sessions = server.app.lock().await;
        let Some(session) = sessions.get_mut(&session_id) else { break };

        let final_event = if kind == "goal" {
            let goal = request.get("goal").and_then(Value::as_str).unwrap_or_default();
            let result = session.run_goal_with_emit(goal, None, Some(&mut sink)).await;
            json!({"event": "goal_done", "success": result.success, "completed_steps": result.completed_steps, "total_steps": result.total_steps})
        } else {
            let user_text = request.get("text").and_then(Value::as_str).unwrap_or_default();
            let result = session.step_with_emit(user_text, Some(&mut sink)).await;
            json!({"event": "reply", "text": result.reply})
        };
        drop(sessions);

        for event in events {
            if socket.send(Message::Text(event.to_string())).await.is_err() {
                return;
            }
        }
        if socket.send(Message::Text(final_event.to_string())).await.is_err() {
            return;
        }
    }
}

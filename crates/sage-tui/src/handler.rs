use std::time::Instant;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use sage_core::{Config, RecordOutcome, SubmitOutcome};
use tracing::{error, info};
use crate::app::{App, InputMode, StatusLevel};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Paste(text) => handle_paste(app, &text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(Instant::now()),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    // Popups take every key while open
    if app.show_category_picker {
        handle_category_picker(app, key);
        return Ok(());
    }
    if app.show_attach_input {
        handle_attach_input(app, key).await;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Editing => handle_editing_mode(app, key),
    }

    Ok(())
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Enter | KeyCode::Tab => {
            app.input_mode = InputMode::Editing;
        }

        // Scrolling
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_down(10),
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => app.scroll_up(10),
        KeyCode::PageDown => app.scroll_down(10),
        KeyCode::PageUp => app.scroll_up(10),
        KeyCode::Char('g') => app.scroll_to_top(),
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('c') => app.open_category_picker(),
        KeyCode::Char('a') => {
            if app.dispatcher.is_busy() {
                app.set_status("Wait for the current reply before attaching", StatusLevel::Info);
            } else {
                app.open_attach_input();
            }
        }
        KeyCode::Char('x') => {
            if !app.dispatcher.attachment().is_none() {
                app.dispatcher.clear_attachment();
                app.set_status("Attachment removed", StatusLevel::Info);
            }
        }
        KeyCode::Char('s') => {
            app.dispatcher.toggle_web_search();
            let state = if app.dispatcher.web_search() { "on" } else { "off" };
            app.set_status(format!("Web search {}", state), StatusLevel::Info);
        }
        KeyCode::Char('r') => toggle_recording(app),
        KeyCode::Char('t') => {
            if !app.dispatcher.toggle_latest_thought() {
                app.set_status("No thought process to show", StatusLevel::Info);
            }
        }
        KeyCode::Char('l') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            if !app.dispatcher.clear_conversation() {
                app.set_status("Wait for the current reply before clearing", StatusLevel::Info);
            }
        }
        KeyCode::Char('N') => clear_documents(app),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => submit_prompt(app),
        KeyCode::Backspace => {
            if app.prompt_cursor > 0 {
                app.prompt_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = app.prompt_input.chars().count();
            if app.prompt_cursor < char_count {
                let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
                app.prompt_input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            app.prompt_cursor = app.prompt_cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = app.prompt_input.chars().count();
            app.prompt_cursor = (app.prompt_cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            app.prompt_cursor = 0;
        }
        KeyCode::End => {
            app.prompt_cursor = app.prompt_input.chars().count();
        }
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Char(c) => insert_text(app, &c.to_string()),
        _ => {}
    }
}

fn insert_text(app: &mut App, text: &str) {
    let byte_pos = char_to_byte_index(&app.prompt_input, app.prompt_cursor);
    app.prompt_input.insert_str(byte_pos, text);
    app.prompt_cursor += text.chars().count();
}

fn submit_prompt(app: &mut App) {
    let input = app.prompt_input.clone();
    let trimmed = input.trim();

    if trimmed == "/clear" {
        if app.dispatcher.clear_conversation() {
            app.clear_prompt();
        } else {
            app.set_status("Wait for the current reply before clearing", StatusLevel::Info);
        }
        return;
    }

    let outcome = match trimmed.strip_prefix("/paper ") {
        Some(rest) => {
            let (paper, question) = parse_paper_command(rest);
            app.dispatcher.submit_paper(&question, &paper)
        }
        None => app.dispatcher.submit(&input),
    };

    match outcome {
        SubmitOutcome::Submitted => {
            app.clear_prompt();
            app.scroll_to_bottom();
        }
        SubmitOutcome::Busy => {
            app.set_status("Waiting for the current reply...", StatusLevel::Info);
        }
        SubmitOutcome::Rejected => {}
    }
}

/// `/paper <paper> | <question>`; without a separator the text serves as both
pub fn parse_paper_command(rest: &str) -> (String, String) {
    match rest.split_once('|') {
        Some((paper, question)) => (paper.trim().to_string(), question.trim().to_string()),
        None => (rest.trim().to_string(), rest.trim().to_string()),
    }
}

fn toggle_recording(app: &mut App) {
    if app.dispatcher.is_recording() {
        app.dispatcher.stop_recording();
        app.scroll_to_bottom();
        return;
    }

    match app.dispatcher.start_recording() {
        RecordOutcome::Started => {
            app.set_status("Recording... press r again to send", StatusLevel::Info);
            app.scroll_to_bottom();
        }
        RecordOutcome::Busy => {
            app.set_status("Waiting for the current reply...", StatusLevel::Info);
        }
        RecordOutcome::Failed => {
            app.set_status("Could not access microphone", StatusLevel::Error);
        }
    }
}

/// Runs in the background so the draw loop keeps ticking; settled by `App::poll_clear_documents`
fn clear_documents(app: &mut App) {
    if app.clear_docs_task.is_some() {
        app.set_status("Already clearing documents...", StatusLevel::Info);
        return;
    }

    let Some(client) = app.dispatcher.client().cloned() else {
        app.set_status("API key or URL is not defined", StatusLevel::Error);
        return;
    };

    app.clear_docs_task = Some(tokio::spawn(async move { client.clear_documents().await }));
    app.set_status("Clearing documents...", StatusLevel::Info);
}

fn handle_category_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => {
            app.show_category_picker = false;
        }
        KeyCode::Char('j') | KeyCode::Down => app.category_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.category_picker_nav_up(),
        KeyCode::Enter => {
            if let Some(category) = app.select_category() {
                info!(category = category.as_str(), "category changed");
                if let Err(e) = Config::save_default_category(category) {
                    error!("failed to save category: {}", e);
                }
                app.set_status(format!("Category: {}", category.display_name()), StatusLevel::Info);
            }
        }
        _ => {}
    }
}

async fn handle_attach_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_attach_input(),
        KeyCode::Enter => {
            let path = expand_home(app.attach_input.trim());
            if path.is_empty() {
                app.close_attach_input();
                return;
            }

            match app.dispatcher.select_file(&path).await {
                Ok(()) => {
                    let badge = app.dispatcher.attachment().badge().unwrap_or_default();
                    app.set_status(format!("Attached {}", badge), StatusLevel::Info);
                    app.close_attach_input();
                    app.input_mode = InputMode::Editing;
                }
                Err(e) => {
                    error!("failed to attach {}: {}", path, e);
                    app.set_status(e.to_string(), StatusLevel::Error);
                }
            }
        }
        KeyCode::Backspace => {
            app.attach_input.pop();
        }
        KeyCode::Char(c) => app.attach_input.push(c),
        _ => {}
    }
}

fn handle_paste(app: &mut App, text: &str) {
    // Terminals paste dragged files as a path, sometimes quoted
    if app.show_attach_input {
        app.attach_input.push_str(text.trim().trim_matches(|c| c == '\'' || c == '"'));
    } else if app.input_mode == InputMode::Editing {
        insert_text(app, &text.replace(['\r', '\n'], " "));
    }
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);

    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(3),
        MouseEventKind::ScrollUp => app.scroll_up(3),
        _ => {}
    }
}

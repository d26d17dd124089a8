use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};
use sage_core::{split_partial, split_thought, Category, ChatMessage, ChatRole, DisplayState};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};
use crate::app::{App, InputMode, StatusLevel};

const STREAM_CURSOR: &str = "▌";
const THOUGHT_GUTTER: &str = "│ ";

/// Word-wrap a styled line, keeping each word's style.
/// Words wider than the pane are split across rows so nothing is clipped.
fn wrap_line(line: Line<'static>, width: usize) -> Vec<Line<'static>> {
    if width == 0 || line.width() <= width {
        return vec![line];
    }

    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut current_width = 0;
    let mut trailing_space = false;

    for span in line.spans {
        let style = span.style;
        let content = span.content.as_ref();
        let leading_space = content.starts_with(char::is_whitespace);

        for (i, word) in content.split_whitespace().enumerate() {
            let word_width = UnicodeWidthStr::width(word);
            let gap = current_width > 0 && (i > 0 || leading_space || trailing_space);

            if gap && current_width + 1 + word_width > width {
                // Word doesn't fit, start new line
                lines.push(Line::from(std::mem::take(&mut current)));
                current_width = 0;
            } else if gap {
                current.push(Span::raw(" "));
                current_width += 1;
            }

            let mut remaining = word;
            while !remaining.is_empty() {
                let available = width.saturating_sub(current_width);
                let (take_bytes, take_width) = take_prefix_by_width(remaining, available);
                if current_width > 0 && take_width > available {
                    // Not even one char fits on this row
                    lines.push(Line::from(std::mem::take(&mut current)));
                    current_width = 0;
                    continue;
                }
                current.push(Span::styled(remaining[..take_bytes].to_string(), style));
                current_width += take_width;
                remaining = &remaining[take_bytes..];
            }
        }

        if !content.is_empty() {
            trailing_space = content.ends_with(char::is_whitespace);
        }
    }

    if !current.is_empty() {
        lines.push(Line::from(current));
    }

    if lines.is_empty() {
        lines.push(Line::default());
    }

    lines
}

/// Longest prefix of `s` that fits in `max_width` columns, as (bytes, columns).
/// Always takes at least one char so callers make progress.
fn take_prefix_by_width(s: &str, max_width: usize) -> (usize, usize) {
    let mut accum_width = 0;
    let mut byte_idx = 0;

    for (idx, ch) in s.char_indices() {
        let ch_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if accum_width + ch_width > max_width && idx > 0 {
            break;
        }
        accum_width += ch_width;
        byte_idx = idx + ch.len_utf8();
    }

    (byte_idx, accum_width)
}

/// Hard-split text into rows of at most `width` columns, whitespace untouched
fn chunk_line(text: &str, width: usize, style: Style) -> Vec<Line<'static>> {
    if width == 0 || UnicodeWidthStr::width(text) <= width {
        return vec![Line::from(Span::styled(text.to_string(), style))];
    }

    let mut lines = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let (take_bytes, _) = take_prefix_by_width(remaining, width);
        lines.push(Line::from(Span::styled(remaining[..take_bytes].to_string(), style)));
        remaining = &remaining[take_bytes..];
    }
    lines
}

/// Parse a line of text and convert **bold** and `code` markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut current_text = String::new();

    while let Some(c) = chars.next() {
        if c == '*' && chars.peek() == Some(&'*') {
            chars.next();

            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            // Find closing **
            let mut bold_text = String::new();
            let mut found_close = false;

            while let Some(c) = chars.next() {
                if c == '*' && chars.peek() == Some(&'*') {
                    chars.next();
                    found_close = true;
                    break;
                }
                bold_text.push(c);
            }

            if found_close && !bold_text.is_empty() {
                spans.push(Span::styled(
                    bold_text,
                    Style::default().add_modifier(Modifier::BOLD),
                ));
            } else {
                // No closing **, treat as literal
                current_text.push_str("**");
                current_text.push_str(&bold_text);
            }
        } else if c == '`' {
            if !current_text.is_empty() {
                spans.push(Span::raw(std::mem::take(&mut current_text)));
            }

            let mut code = String::new();
            let mut found_close = false;
            for c in chars.by_ref() {
                if c == '`' {
                    found_close = true;
                    break;
                }
                code.push(c);
            }

            if found_close {
                spans.push(Span::styled(code, Style::default().fg(Color::Green)));
            } else {
                current_text.push('`');
                current_text.push_str(&code);
            }
        } else {
            current_text.push(c);
        }
    }

    if !current_text.is_empty() {
        spans.push(Span::raw(current_text));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Render a block of markdown: headings, bullets, fenced code, inline emphasis
fn render_markdown(text: &str, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code = false;

    for raw in text.lines() {
        let trimmed = raw.trim_start();

        if trimmed.starts_with("```") {
            in_code = !in_code;
            continue;
        }

        if in_code {
            // Code keeps its indentation; only overlong lines are split
            lines.extend(chunk_line(raw, width, Style::default().fg(Color::Green)));
            continue;
        }

        let heading = trimmed
            .strip_prefix("### ")
            .or_else(|| trimmed.strip_prefix("## "))
            .or_else(|| trimmed.strip_prefix("# "));
        if let Some(heading) = heading {
            let line = Line::from(Span::styled(
                heading.to_string(),
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            ));
            lines.extend(wrap_line(line, width));
            continue;
        }

        let bullet = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "));
        if let Some(item) = bullet {
            let mut line = parse_markdown_line(item);
            line.spans.insert(0, Span::raw("• "));
            lines.extend(wrap_line(line, width));
            continue;
        }

        lines.extend(wrap_line(parse_markdown_line(raw), width));
    }

    lines
}

fn thinking_line(frame_idx: u8) -> Line<'static> {
    // Animated ellipsis: cycles through ".", "..", "..."
    let dots = ".".repeat((frame_idx as usize) + 1);
    Line::from(Span::styled(
        format!("Thinking{}", dots),
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    ))
}

fn assistant_label() -> Line<'static> {
    Line::from(Span::styled(
        "AI:",
        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    ))
}

fn thought_lines(thought: &str, open: bool, width: usize) -> Vec<Line<'static>> {
    let marker = if open { "▾" } else { "▸" };
    let mut lines = vec![Line::from(Span::styled(
        format!("{} Thought Process (t)", marker),
        Style::default().fg(Color::Magenta),
    ))];

    if open {
        let style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC);
        let inner = width.saturating_sub(THOUGHT_GUTTER.chars().count());
        for raw in thought.lines() {
            for wrapped in wrap_line(Line::from(Span::styled(raw.to_string(), style)), inner) {
                let mut spans = vec![Span::styled(THOUGHT_GUTTER, style)];
                spans.extend(wrapped.spans);
                lines.push(Line::from(spans));
            }
        }
    }

    lines
}

/// Lines for one turn, wrapped to the chat width
fn message_lines(msg: &ChatMessage, frame_idx: u8, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    match msg.role {
        ChatRole::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for raw in msg.content.lines() {
                lines.extend(wrap_line(Line::from(raw.to_string()), width));
            }
        }
        ChatRole::Assistant => {
            lines.push(assistant_label());

            match msg.display {
                DisplayState::Pending => lines.push(thinking_line(frame_idx)),
                DisplayState::Revealing { .. } => {
                    let split = split_partial(msg.visible_text());
                    if let Some(thought) = &split.thought {
                        lines.extend(thought_lines(thought, msg.thought_open, width));
                    }

                    let mut body: Vec<Line<'static>> = Vec::new();
                    for raw in split.main.lines() {
                        body.extend(wrap_line(Line::from(raw.to_string()), width));
                    }
                    match body.last_mut() {
                        Some(last) => last.spans.push(Span::styled(STREAM_CURSOR, Style::default().fg(Color::Yellow))),
                        None => body.push(Line::from(Span::styled(STREAM_CURSOR, Style::default().fg(Color::Yellow)))),
                    }
                    lines.extend(body);
                }
                DisplayState::Complete => {
                    let split = split_thought(&msg.content);
                    if let Some(thought) = &split.thought {
                        lines.extend(thought_lines(thought, msg.thought_open, width));
                    }
                    lines.extend(render_markdown(&split.main, width));
                }
            }
        }
    }

    lines.push(Line::default());
    lines
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, input, footer
    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_category_picker {
        render_category_picker(app, frame, area);
    } else if app.show_attach_input {
        render_attach_input(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let category = app.current_category();

    let mut title = vec![
        Span::styled(" Sage ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", category.display_name()),
            Style::default().fg(Color::White),
        ),
    ];

    if app.dispatcher.web_search() {
        title.push(Span::raw(" "));
        title.push(Span::styled("[Web Search]", Style::default().fg(Color::Green)));
    }

    if let Some(badge) = app.dispatcher.attachment().badge() {
        title.push(Span::raw(" "));
        title.push(Span::styled(format!("[{}]", badge), Style::default().fg(Color::Magenta)));
    }

    if app.dispatcher.is_recording() {
        title.push(Span::raw(" "));
        title.push(Span::styled(" ● REC ", Style::default().bg(Color::Red).fg(Color::White).bold()));
    }

    title.push(Span::raw(" "));
    title.push(Span::styled(
        format!("v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::Gray),
    ));

    let header = Paragraph::new(Line::from(title)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store area for mouse hit-testing
    app.chat_area = Some(area);

    let inner_width = area.width.saturating_sub(2) as usize;
    let inner_height = area.height.saturating_sub(2);

    let conversation = app.dispatcher.conversation();

    let chat_text = if conversation.is_empty() && !app.dispatcher.is_busy() {
        Text::from(Span::styled(
            format!("Ask a {} question...", app.current_category().display_name().to_lowercase()),
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();
        for msg in conversation.turns() {
            lines.extend(message_lines(msg, app.animation_frame, inner_width));
        }

        // Voice replies have no placeholder turn of their own
        if app.dispatcher.awaiting_voice_reply() {
            lines.push(assistant_label());
            lines.push(thinking_line(app.animation_frame));
        }

        Text::from(lines)
    };

    // Lines are pre-wrapped, so the count is exact
    let total = chat_text.lines.len() as u16;
    app.chat_max_scroll = total.saturating_sub(inner_height);
    if app.follow_tail || app.chat_scroll > app.chat_max_scroll {
        app.chat_scroll = app.chat_max_scroll;
    }

    let border_color = if app.input_mode == InputMode::Normal { Color::Cyan } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(" Chat: {} ", app.current_category().display_name()));

    let chat = Paragraph::new(chat_text)
        .block(block)
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let busy = app.dispatcher.is_busy();

    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = if app.dispatcher.is_recording() {
        " Recording (r to send) "
    } else if busy {
        " Ask (waiting for reply) "
    } else if editing {
        " Ask (Enter to send, Esc for commands) "
    } else {
        " Ask (i to type) "
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.prompt_cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .prompt_input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let style = if busy {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let input = Paragraph::new(visible_text).style(style).block(input_block);
    frame.render_widget(input, area);

    if editing && !app.show_category_picker && !app.show_attach_input {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" NORMAL ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Editing => (" INSERT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut spans = vec![
        Span::styled(mode_text, mode_style),
        Span::styled(" ", label_style),
    ];

    if let Some(status) = &app.status {
        let style = match status.level {
            StatusLevel::Info => Style::default().bg(Color::Black).fg(Color::Green),
            StatusLevel::Error => Style::default().bg(Color::Black).fg(Color::Red),
        };
        spans.push(Span::styled(status.text.clone(), style));
    } else {
        let hints: &[(&str, &str)] = match app.input_mode {
            InputMode::Normal => &[
                ("i", "type"),
                ("c", "category"),
                ("a", "attach"),
                ("x", "detach"),
                ("s", "search"),
                ("r", "record"),
                ("t", "thought"),
                ("j/k", "scroll"),
                ("N", "clear docs"),
                ("q", "quit"),
            ],
            InputMode::Editing => &[
                ("Enter", "send"),
                ("/paper", "paper | question"),
                ("Esc", "commands"),
            ],
        };

        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {} ", label), label_style));
        }
    }

    let footer = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn popup_rect(area: Rect, width: u16, height: u16) -> Rect {
    let popup_width = width.min(area.width.saturating_sub(4));
    let popup_height = height.min(area.height.saturating_sub(4));

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;

    Rect::new(popup_x, popup_y, popup_width, popup_height)
}

/// One row of a popup's inner area; empty when the popup is too short to hold it
fn popup_row(inner: Rect, offset: u16) -> Rect {
    Rect::new(inner.x, inner.y.saturating_add(offset), inner.width, 1).intersection(inner)
}

fn render_category_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let categories = Category::all();
    let current = app.current_category();

    let popup_area = popup_rect(area, 40, categories.len() as u16 + 2);

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Select Category ");

    let items: Vec<ListItem> = categories
        .iter()
        .map(|category| {
            let is_current = *category == current;
            let prefix = if is_current { "* " } else { "  " };
            let style = if is_current {
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, category.display_name())).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.category_picker_state);
}

fn render_attach_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = popup_rect(area, 70, 7);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Attach Image or PDF ");

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let instructions = Paragraph::new("Type or paste a file path. Enter to attach, Esc to cancel.")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(instructions, popup_row(inner, 0));

    // Keep the tail of long paths visible
    let input_area = popup_row(inner, 2);
    let width = input_area.width as usize;
    let len = app.attach_input.chars().count();
    let skip = (len + 1).saturating_sub(width);
    let visible: String = app.attach_input.chars().skip(skip).collect();

    let input = Paragraph::new(visible).style(Style::default().fg(Color::Cyan));
    frame.render_widget(input, input_area);

    if !input_area.is_empty() {
        let cursor_x = (len - skip).min(width) as u16;
        frame.set_cursor_position((input_area.x + cursor_x, input_area.y));
    }

    let current = app
        .dispatcher
        .attachment()
        .badge()
        .map(|b| format!("Current: {}", b))
        .unwrap_or_else(|| "Supported: png, jpg, jpeg, gif, webp, bmp, pdf".to_string());
    let status = Paragraph::new(current).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status, popup_row(inner, 4));
}

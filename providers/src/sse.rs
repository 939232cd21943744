//! Server-sent event framing.

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

/// Removes and returns the next complete event from `buffer`.
pub(crate) fn drain_next_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

/// Joins the `data:` lines of one event.
pub(crate) fn extract_data(event: &str) -> Option<String> {
    let mut data: Option<String> = None;
    for line in event.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(rest) = line.strip_prefix("data:") else {
            continue;
        };
        let rest = rest.strip_prefix(' ').unwrap_or(rest);
        match data.as_mut() {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(rest);
            }
            None => data = Some(rest.to_string()),
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::{drain_next_event, extract_data};

    #[test]
    fn drains_events_in_order() {
        let mut buf = b"event: a\ndata: 1\n\nevent: b\r\ndata: 2\r\n\r\npartial".to_vec();
        let first = drain_next_event(&mut buf).unwrap();
        assert_eq!(extract_data(std::str::from_utf8(&first).unwrap()).unwrap(), "1");
        let second = drain_next_event(&mut buf).unwrap();
        assert_eq!(extract_data(std::str::from_utf8(&second).unwrap()).unwrap(), "2");
        assert!(drain_next_event(&mut buf).is_none());
        assert_eq!(buf, b"partial");
    }

    #[test]
    fn multi_line_data_joined() {
        assert_eq!(extract_data("data: a\ndata:b").unwrap(), "a\nb");
        assert!(extract_data("event: ping").is_none());
    }
}

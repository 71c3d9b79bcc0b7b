/// Strips characters that should never reach the item table: control
/// characters other than ordinary whitespace, and Unicode format or
/// private-use code points that render as nothing.
pub fn sanitize_text(input: &str) -> String {
    input.chars().filter(|c| is_printable(*c)).collect()
}

fn is_printable(c: char) -> bool {
    match c {
        ' ' | '\t' | '\n' | '\r' => true,
        c if c.is_control() => false,
        // zero-width and bidi controls
        '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2064}' => false,
        '\u{FEFF}' | '\u{FFF9}'..='\u{FFFB}' => false,
        '\u{E000}'..='\u{F8FF}' => false,
        // noncharacters, not allowed in XML
        '\u{FDD0}'..='\u{FDEF}' => false,
        c if (c as u32) & 0xFFFE == 0xFFFE => false,
        _ => true,
    }
}

/// Width of the blank shown in place of an underscore run.
const BLANK: &str = "__________";

/// Replaces every run of two or more underscores in a prompt with a blank of
/// fixed width, so `"I __ to school"` and `"I ______ to school"` render alike.
///
/// A single underscore is left untouched.
///
/// # Arguments
///
/// * `prompt`: The question text as stored in the set file.
///
/// # Returns
///
/// The prompt with normalized blanks.
pub fn normalize_blanks(prompt: &str) -> String {
    let mut out = String::with_capacity(prompt.len());
    let mut run = 0usize;

    for ch in prompt.chars() {
        if ch == '_' {
            run += 1;
            continue;
        }
        flush_run(&mut out, run);
        run = 0;
        out.push(ch);
    }
    flush_run(&mut out, run);

    out
}

fn flush_run(out: &mut String, run: usize) {
    match run {
        0 => {}
        1 => out.push('_'),
        _ => out.push_str(BLANK),
    }
}

/// Reads a requested question count the way a loosely typed form field is
/// read: leading whitespace is skipped and the leading digits are taken, so
/// `"12 questions"` is 12.
///
/// # Arguments
///
/// * `input`: The raw count, if any was supplied.
/// * `default`: Used when the input is absent, has no leading digits, or is zero.
///
/// # Returns
///
/// A positive count.
pub fn parse_count(input: Option<&str>, default: usize) -> usize {
    let Some(raw) = input else {
        return default;
    };

    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();

    match digits.parse::<usize>() {
        Ok(0) | Err(_) => default,
        Ok(n) => n,
    }
}

/// Letter label for an option position: A, B, C, ... then AA, AB, ...
pub fn option_letter(position: usize) -> String {
    let mut n = position;
    let mut label = Vec::new();
    loop {
        label.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.iter().rev().collect()
}

//! Operator prompts shared across programs

use crate::locator::PortDescriptor;
use std::io::{self, BufRead, Write};

/// Print `prompt` and wait for the operator to press Enter
pub fn wait_for_enter<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<()> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(())
}

/// Ask a yes/no question; anything but `y`/`yes` counts as no
///
/// # Example
/// ```
/// use serial_pressure_recorder::confirm;
///
/// let mut input = "Yes\n".as_bytes();
/// let mut output = Vec::new();
/// assert!(confirm(&mut input, &mut output, "Plot data into PNG? [y/N] ")?);
/// # Ok::<(), std::io::Error>(())
/// ```
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> io::Result<bool> {
    write!(output, "{}", prompt)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Let the operator pick one of several ports by number
///
/// Returns `None` when the answer is empty or not a listed number.
pub fn choose_port<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    candidates: &[PortDescriptor],
) -> io::Result<Option<usize>> {
    writeln!(output, "I see more than one USB-Serial Controller:")?;
    for (i, port) in candidates.iter().enumerate() {
        writeln!(output, " {}. {}", i + 1, port)?;
    }
    write!(output, "Which one is the MCU? [1-{}, Enter to search by vendor ID] ", candidates.len())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|&n| n >= 1 && n <= candidates.len())
        .map(|n| n - 1))
}

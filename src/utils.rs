use crate::bank::Bank;
use crate::cluster::ClusterIndex;
use chrono::Local;

/// `info!` that keeps ANSI colours only when `$colorful` is set
#[macro_export]
macro_rules! cinfo {
    ($colorful:expr, $($arg:tt)+) => {
        if $colorful {
            log::info!($($arg)+);
        } else {
            log::info!("{}", $crate::utils::strip_ansi(&format!($($arg)+)));
        }
    };
}

/// Removes `ESC[...m` colour sequences
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' && chars.peek() == Some(&'[') {
            for n in chars.by_ref() {
                if n == 'm' {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Crate version followed by the commit it was built from, `unknown` outside a git checkout.
pub fn version() -> String {
    format!(
        "{}#{}",
        env!("CARGO_PKG_VERSION"),
        option_env!("COPHESELECT_BUILD").unwrap_or("unknown")
    )
}

pub fn clock() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

/// Progress line printed every `interval` generations
pub fn display_generation(bank: &Bank, clusters: &ClusterIndex, generation: usize) -> String {
    match bank.best() {
        Some(best) => format!(
            "\x1b[1;93m#{}\x1b[0m => {} | best \x1b[1;92m{}\x1b[0m",
            generation,
            clock(),
            best.display(clusters)
        ),
        None => format!("#{} => {} | empty bank", generation, clock()),
    }
}

pub fn display_mode_banner(mode: &str) -> String {
    format!("\x1b[1;42m {} \x1b[0m", mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Candidate;

    #[test]
    fn test_strip_ansi_removes_colour_codes() {
        assert_eq!(strip_ansi("\x1b[1;93mhello\x1b[0m world"), "hello world");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_version_names_package_and_build() {
        let version = version();
        let (package, build) = version.split_once('#').unwrap();
        assert_eq!(package, env!("CARGO_PKG_VERSION"));
        assert!(!build.is_empty(), "build part must never be empty");
    }

    #[test]
    fn test_display_generation_shows_best() {
        let clusters = ClusterIndex::from_assignment(&[("a", 1), ("b", 2)]).unwrap();
        let bank = Bank::from_candidates(vec![Candidate::new(vec![0, 1], 0.75, 3)]);
        let line = strip_ansi(&display_generation(&bank, &clusters, 10));
        assert!(line.starts_with("#10 => "), "unexpected line: {}", line);
        assert!(line.contains("0.750000"));
        assert!(line.contains("a[c1], b[c2]"));
    }
}

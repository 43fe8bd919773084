//! Language tags accepted on questions and the execution-service runtime ids
//! they map to.

const RUNTIMES: &[(&[&str], u32)] = &[
    (&["c"], 50),
    (&["cpp", "c++"], 54),
    (&["csharp", "c#"], 51),
    (&["go", "golang"], 60),
    (&["java"], 62),
    (&["javascript", "js", "node"], 63),
    (&["php"], 68),
    (&["python", "python3", "py"], 71),
    (&["ruby"], 72),
    (&["rust"], 73),
    (&["typescript", "ts"], 74),
    (&["kotlin"], 78),
    (&["swift"], 83),
];

pub fn runtime_id(language: &str) -> Option<u32> {
    let tag = language.trim().to_ascii_lowercase();
    RUNTIMES
        .iter()
        .find(|(aliases, _)| aliases.contains(&tag.as_str()))
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::runtime_id;

    #[test]
    fn maps_aliases_case_insensitively() {
        assert_eq!(runtime_id("Python"), Some(71));
        assert_eq!(runtime_id("c++"), Some(54));
        assert_eq!(runtime_id(" js "), Some(63));
        assert_eq!(runtime_id("brainfuck"), None);
    }
}

use crate::error::HarnessError;

/// Supported extensions in canonical `-march` order. The toolchain's
/// architecture string is positional, so composition must always walk this
/// table rather than the caller's enumeration order.
const EXTENSIONS: &[(&str, &str)] = &[
    ("I", "i"),
    ("M", "m"),
    ("C", "c"),
    ("Zbkb", "zbkb"),
];

/// Derive the canonical ISA string (e.g. `rv32im`) for a feature set.
///
/// Unknown labels fail with [`HarnessError::UnsupportedExtension`];
/// duplicates collapse to a single letter.
pub fn march(xlen: u8, features: &[String]) -> Result<String, HarnessError> {
    for feature in features {
        if !EXTENSIONS.iter().any(|(label, _)| label == feature) {
            return Err(HarnessError::UnsupportedExtension(feature.clone()));
        }
    }

    let mut isa = format!("rv{xlen}");
    for (label, letters) in EXTENSIONS {
        if features.iter().any(|feature| feature == label) {
            isa.push_str(letters);
        }
    }
    Ok(isa)
}

/// Scan a RISCOF-style ISA string (e.g. `RV32IMCZbkb`) for known extension
/// labels, longest first so `Zbkb` is not misread as a bare `b`.
pub fn features_from_isa_string(isa: &str) -> Vec<String> {
    let mut features = Vec::new();
    for (label, _) in EXTENSIONS {
        if label.len() > 1 {
            if isa.contains(label) {
                features.push((*label).to_owned());
            }
        } else if isa_has_letter(isa, label) {
            features.push((*label).to_owned());
        }
    }
    features
}

/// Single-letter extensions must match in the base-extension region, not
/// inside a Z-extension name (the `b` of `Zbkb` is not the B extension).
fn isa_has_letter(isa: &str, letter: &str) -> bool {
    let base = match isa.find('Z') {
        Some(pos) => &isa[..pos],
        None => isa,
    };
    base.contains(letter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn canonical_order_is_independent_of_input_order() {
        let forward = march(32, &labels(&["I", "M", "C", "Zbkb"])).unwrap();
        let reversed = march(32, &labels(&["Zbkb", "C", "M", "I"])).unwrap();
        assert_eq!(forward, "rv32imczbkb");
        assert_eq!(forward, reversed);
    }

    #[test]
    fn base_and_subset() {
        assert_eq!(march(32, &labels(&["I"])).unwrap(), "rv32i");
        assert_eq!(march(32, &labels(&["M", "I"])).unwrap(), "rv32im");
        assert_eq!(march(64, &labels(&["I", "C"])).unwrap(), "rv64ic");
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(march(32, &labels(&["I", "I", "M"])).unwrap(), "rv32im");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = march(32, &labels(&["I", "V"])).unwrap_err();
        assert!(matches!(err, HarnessError::UnsupportedExtension(ref label) if label == "V"));
    }

    #[test]
    fn features_from_riscof_isa_string() {
        assert_eq!(
            features_from_isa_string("RV32IMCZbkb"),
            labels(&["I", "M", "C", "Zbkb"])
        );
        assert_eq!(features_from_isa_string("RV32I"), labels(&["I"]));
        // The trailing b of Zbkb must not register as a base extension.
        assert_eq!(features_from_isa_string("RV32IZbkb"), labels(&["I", "Zbkb"]));
    }
}

/// Rendering of flat `key=value[unit]` sub-model configuration files.
///
/// Structs derive [`ConfigLines`] through `basinflow_macros::ConfigLines`;
/// field values render through [`ConfigValue`].

/// A value that can appear on the right-hand side of a config line.
pub trait ConfigValue {
    fn render(&self) -> String;
}

/// An ordered set of config lines.
pub trait ConfigLines {
    /// Keys in emission order, including optional ones.
    fn keys() -> &'static [&'static str];

    fn lines(&self) -> Vec<String>;

    /// File content: lines joined by newlines, no trailing newline.
    fn render(&self) -> String {
        self.lines().join("\n")
    }
}

impl ConfigValue for f64 {
    // Debug keeps the decimal point on whole numbers (16.0, not 16).
    fn render(&self) -> String {
        format!("{self:?}")
    }
}

impl ConfigValue for i64 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for u32 {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for usize {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for bool {
    fn render(&self) -> String {
        let s = if *self { "true" } else { "false" };
        s.to_string()
    }
}

impl ConfigValue for str {
    fn render(&self) -> String {
        self.to_string()
    }
}

impl ConfigValue for String {
    fn render(&self) -> String {
        self.clone()
    }
}

impl<T: ConfigValue + ?Sized> ConfigValue for &T {
    fn render(&self) -> String {
        (**self).render()
    }
}

impl ConfigValue for Vec<f64> {
    fn render(&self) -> String {
        self.iter()
            .map(ConfigValue::render)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl ConfigValue for std::path::PathBuf {
    fn render(&self) -> String {
        self.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -- scalar rendering --

    #[test]
    fn floats_keep_decimal_point() {
        assert_eq!(16.0_f64.render(), "16.0");
        assert_eq!(0.355_f64.render(), "0.355");
    }

    #[test]
    fn bools_render_lowercase() {
        assert_eq!(true.render(), "true");
        assert_eq!(false.render(), "false");
    }

    #[test]
    fn str_references_render_verbatim() {
        let s: &str = "Schaake";
        assert_eq!(s.render(), "Schaake");
    }

    // -- sequences --

    #[test]
    fn float_vectors_are_comma_joined() {
        assert_eq!(vec![0.0, 0.0].render(), "0.0,0.0");
        assert_eq!(vec![0.1, 0.15, 6.0].render(), "0.1,0.15,6.0");
    }

    #[test]
    fn empty_vector_renders_empty() {
        assert_eq!(Vec::<f64>::new().render(), "");
    }
}

//! Path templates to path partials

use crate::errors::{CompileError, Result};
use monkey_types::{Param, ParamKind, PathParamRef, PathPartial};

/// Split `template` on its `{name}` segments, resolving each against the
/// endpoint's path inputs, and fold the base path into the front.
pub fn path_partials(base: &str, template: &str, inputs: &[Param]) -> Result<Vec<PathPartial>> {
    let bad = |reason: &str| CompileError::BadPathTemplate {
        path: template.to_string(),
        reason: reason.to_string(),
    };

    let mut partials = Vec::new();
    let mut literal = String::new();
    let mut rest = template;

    while let Some(open) = rest.find(['{', '}']) {
        if rest[open..].starts_with('}') {
            return Err(bad("unmatched '}'"));
        }
        literal.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find(['{', '}']).ok_or_else(|| bad("unclosed '{'"))?;
        if after[close..].starts_with('{') {
            return Err(bad("nested '{'"));
        }
        let name = &after[..close];
        if name.is_empty() {
            return Err(bad("empty parameter name"));
        }

        let param = inputs
            .iter()
            .find(|param| param.kind == ParamKind::Path && param.name == name)
            .ok_or_else(|| CompileError::UnknownPathParam {
                path: template.to_string(),
                name: name.to_string(),
            })?;

        if !literal.is_empty() {
            partials.push(PathPartial::Part(std::mem::take(&mut literal)));
        }
        partials.push(PathPartial::Ptr(PathParamRef {
            name: name.to_string(),
            sid: param.sid,
        }));
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        partials.push(PathPartial::Part(literal));
    }

    let mut base = base.trim_end_matches('/').to_string();
    if !base.is_empty() {
        // `/api/` + `{category}` keeps its separator.
        if !template.starts_with('/') {
            base.push('/');
        }
        match partials.first_mut() {
            Some(PathPartial::Part(first)) => first.insert_str(0, &base),
            _ => partials.insert(0, PathPartial::literal(base)),
        }
    }
    Ok(partials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use monkey_types::Sid;

    fn path_param(name: &str, sid: u32) -> Param {
        Param {
            kind: ParamKind::Path,
            name: name.into(),
            required: true,
            sid: Sid(sid),
        }
    }

    fn ptr(name: &str, sid: u32) -> PathPartial {
        PathPartial::Ptr(PathParamRef {
            name: name.into(),
            sid: Sid(sid),
        })
    }

    #[test]
    fn test_base_merges_into_leading_literal() {
        let partials = path_partials("/v1", "/pets/{id}", &[path_param("id", 4)]).unwrap();
        assert_eq!(partials, vec![PathPartial::literal("/v1/pets/"), ptr("id", 4)]);
    }

    #[test]
    fn test_leading_parameter_stays_first() {
        let inputs = [path_param("category", 1), path_param("name", 2)];
        let partials = path_partials("/", "{category}/{name}", &inputs).unwrap();
        assert_eq!(
            partials,
            vec![ptr("category", 1), PathPartial::literal("/"), ptr("name", 2)]
        );

        let based = path_partials("/api/", "{category}", &inputs).unwrap();
        assert_eq!(based, vec![PathPartial::literal("/api/"), ptr("category", 1)]);
        let based = path_partials("/api", "{category}", &inputs).unwrap();
        assert_eq!(based, vec![PathPartial::literal("/api/"), ptr("category", 1)]);
    }

    #[test]
    fn test_base_separator_before_relative_literal() {
        let partials = path_partials("/api/", "pets/{name}", &[path_param("name", 2)]).unwrap();
        assert_eq!(partials, vec![PathPartial::literal("/api/pets/"), ptr("name", 2)]);
    }

    #[test]
    fn test_literal_only_path() {
        assert_eq!(
            path_partials("", "/health", &[]).unwrap(),
            vec![PathPartial::literal("/health")]
        );
        assert_eq!(
            path_partials("/v2/", "/", &[]).unwrap(),
            vec![PathPartial::literal("/v2/")]
        );
    }

    #[test]
    fn test_malformed_templates() {
        let inputs = [path_param("id", 1)];
        for template in ["/pets/{id", "/pets/id}", "/pets/{}", "/pets/{{id}}", "/a/{id{x}}"] {
            assert!(
                matches!(
                    path_partials("/", template, &inputs),
                    Err(CompileError::BadPathTemplate { .. })
                ),
                "{template:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unknown_parameter() {
        let query = Param {
            kind: ParamKind::Query,
            name: "id".into(),
            required: false,
            sid: Sid(1),
        };
        assert_eq!(
            path_partials("/", "/pets/{id}", &[query]),
            Err(CompileError::UnknownPathParam {
                path: "/pets/{id}".into(),
                name: "id".into()
            })
        );
    }

    fn render(partials: &[PathPartial]) -> String {
        partials
            .iter()
            .map(|partial| match partial {
                PathPartial::Part(text) => text.clone(),
                PathPartial::Ptr(param) => format!("{{{}}}", param.name),
            })
            .collect()
    }

    proptest::proptest! {
        #[test]
        fn prop_partials_render_back_to_template(
            base in "(/[a-z0-9]{1,6}){0,2}/?",
            segments in proptest::collection::vec(("/[a-z0-9-]{0,6}", proptest::option::of("[a-z][a-z0-9_]{0,5}")), 1..5),
        ) {
            let mut template = String::new();
            let mut inputs = Vec::new();
            for (index, (literal, name)) in segments.iter().enumerate() {
                template.push_str(literal);
                if let Some(name) = name {
                    template.push_str(&format!("{{{name}}}"));
                    inputs.push(path_param(name, index as u32));
                }
            }

            let partials = path_partials(&base, &template, &inputs).unwrap();
            let expected = format!("{}{}", base.trim_end_matches('/'), template);
            proptest::prop_assert_eq!(render(&partials), expected);
            for pair in partials.windows(2) {
                let adjacent_literals =
                    matches!(pair, [PathPartial::Part(_), PathPartial::Part(_)]);
                proptest::prop_assert!(!adjacent_literals);
            }
        }
    }
}

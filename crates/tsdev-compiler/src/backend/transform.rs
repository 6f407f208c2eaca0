use std::{path::Path, sync::Arc};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use swc_core::{
    common::{
        comments::SingleThreadedComments,
        errors::{ColorConfig, Handler},
        sync::Lrc,
        FileName, Globals, Mark, SourceMap, GLOBALS,
    },
    ecma::{
        ast::EsVersion,
        codegen::{text_writer::JsWriter, Config as CodegenConfig, Emitter},
        parser::{lexer::Lexer, EsConfig, Parser, StringInput, Syntax, TsConfig},
        transforms::{
            base::{helpers, resolver},
            module::common_js,
            react::{react, Options as ReactOptions, Runtime as ReactRuntime},
            typescript::typescript,
        },
        visit::FoldWith,
    },
};

use crate::error::CompileError;

/// The result of transpiling one file: its CommonJS output with an inline
/// source map comment appended, plus the standalone source map JSON (kept
/// around on [`crate::cache::CompiledFile`] alongside the inlined copy).
pub struct Transpiled {
    pub code: String,
    pub source_map_json: String,
}

/// Transforms one source file's contents to CommonJS with an inline
/// source map, using SWC's parser/transform/codegen pipeline directly
/// (no bundling, no type-checking — matching the Non-goals). `.tsx`/`.jsx`
/// sources additionally get JSX lowered to `React.createElement` calls
/// before the CommonJS transform runs.
pub fn transpile(path: &Path, source: &str) -> Result<Transpiled, CompileError> {
    let cm: Lrc<SourceMap> = Default::default();
    let handler = Handler::with_tty_emitter(ColorConfig::Auto, true, false, Some(cm.clone()));

    let fm = cm.new_source_file(FileName::Real(path.to_path_buf()), source.to_string());

    let ext = path.extension().and_then(|e| e.to_str());
    let is_typescript = matches!(ext, Some("ts") | Some("tsx") | Some("mts") | Some("cts"));
    let is_jsx = matches!(ext, Some("tsx") | Some("jsx"));
    let syntax = if is_typescript {
        Syntax::Typescript(TsConfig {
            tsx: ext == Some("tsx"),
            decorators: true,
            ..Default::default()
        })
    } else {
        Syntax::Es(EsConfig {
            jsx: is_jsx,
            ..Default::default()
        })
    };

    let lexer = Lexer::new(syntax, EsVersion::Es2020, StringInput::from(&*fm), None);
    let mut parser = Parser::new_from(lexer);

    let module = parser
        .parse_module()
        .map_err(|err| CompileError::Transform {
            path: crate::paths::SourcePath::new(path.to_path_buf())
                .unwrap_or_else(|_| crate::paths::SourcePath::new("/").unwrap()),
            message: format!("{err:?}"),
        })?;

    for err in parser.take_errors() {
        handler.struct_err(&err.kind().msg()).emit();
    }

    let (code, source_map_json) = GLOBALS.set(&Globals::new(), || {
        let top_level_mark = Mark::new();
        let unresolved_mark = Mark::new();
        let comments: SingleThreadedComments = Default::default();

        let module = module.fold_with(&mut resolver(unresolved_mark, top_level_mark, is_typescript));
        let module = module.fold_with(&mut typescript(Default::default(), top_level_mark));
        let module = if is_jsx {
            // Classic runtime: emits `React.createElement(...)` calls and
            // expects `React` to be in scope, rather than injecting an
            // automatic `react/jsx-runtime` import.
            let react_config = ReactOptions {
                runtime: Some(ReactRuntime::Classic),
                ..Default::default()
            };
            module.fold_with(&mut react(
                cm.clone(),
                Some(comments.clone()),
                react_config,
                top_level_mark,
            ))
        } else {
            module
        };
        let module = module.fold_with(&mut common_js(
            unresolved_mark,
            Default::default(),
            Default::default(),
            None,
        ));
        let module = module.fold_with(&mut helpers::inject_helpers(unresolved_mark));

        let mut buf = Vec::new();
        let mut src_map_buf = Vec::new();
        {
            let writer = JsWriter::new(cm.clone(), "\n", &mut buf, Some(&mut src_map_buf));
            let mut emitter = Emitter {
                cfg: CodegenConfig::default(),
                cm: cm.clone(),
                comments: None,
                wr: writer,
            };
            emitter.emit_module(&module).expect("in-memory codegen never fails on I/O");
        }
        let code = String::from_utf8(buf).expect("codegen output is always valid UTF-8");

        let mut source_map_json = Vec::new();
        cm.build_source_map(&src_map_buf)
            .to_writer(&mut source_map_json)
            .expect("in-memory sourcemap serialization never fails on I/O");
        let source_map_json =
            String::from_utf8(source_map_json).expect("sourcemap JSON is always valid UTF-8");

        (code, source_map_json)
    });

    let encoded = BASE64.encode(&source_map_json);
    let code = format!(
        "{code}\n//# sourceMappingURL=data:application/json;charset=utf-8;base64,{encoded}\n"
    );

    Ok(Transpiled {
        code,
        source_map_json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn transpiles_typescript_type_annotations_away() {
        let path = PathBuf::from("/repo/src/a.ts");
        let source = "export const x: number = 1;\n";
        let output = transpile(&path, source).unwrap();
        assert!(!output.code.contains(": number"));
        assert!(output.code.contains("exports"));
    }

    #[test]
    fn passes_through_plain_javascript() {
        let path = PathBuf::from("/repo/src/a.js");
        let source = "export const x = 1;\n";
        let output = transpile(&path, source).unwrap();
        assert!(output.code.contains("exports"));
    }

    #[test]
    fn inlines_a_source_map_comment() {
        let path = PathBuf::from("/repo/src/a.ts");
        let output = transpile(&path, "export const x = 1;\n").unwrap();
        assert!(output
            .code
            .contains("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
        assert!(output.source_map_json.contains("\"mappings\""));
    }

    #[test]
    fn lowers_jsx_in_tsx_sources() {
        let path = PathBuf::from("/repo/src/a.tsx");
        let source = "export const el = <div className=\"x\" />;\n";
        let output = transpile(&path, source).unwrap();
        assert!(!output.code.contains('<'));
        assert!(output.code.contains("React.createElement"));
    }
}

use argforge::assemble::redirect::{self, Redirect, Target};
use argforge::assemble::{FragmentMerger, MergeOptions, create_command, merge};
use argforge::parse::TargetKind;
use argforge::{
    BuildError, CommandTask, Error, Fragment, FragmentChain, SandboxViolation, Stream, Task,
    TemplateError, Value,
};
use pretty_assertions::assert_eq;

fn chain(fragments: Vec<Fragment>) -> FragmentChain {
    FragmentChain::from_fragments(fragments).expect("non-empty chain")
}

fn argv_for(template: &str, values: &[Value]) -> Vec<String> {
    let tasks = argforge::assemble(template, values).expect("template assembles");
    assert_eq!(tasks.len(), 1, "template: {template}");
    tasks[0].argv().into_iter().map(String::from).collect()
}

fn prefix_for(template: &str, values: &[Value], index: usize) -> Option<String> {
    let tasks = argforge::assemble(template, values).expect("template assembles");
    tasks[0].arguments()[index].sandbox_prefix.clone()
}

macro_rules! argv_test {
    ($name:ident, $template:expr, [$($value:expr),*], [$($arg:expr),*]) => {
        #[test]
        fn $name() {
            let values: Vec<Value> = vec![$(Value::from($value)),*];
            let expected: Vec<String> = vec![$(String::from($arg)),*];
            assert_eq!(argv_for($template, &values), expected, "template: {}", $template);
        }
    };
}

// ── Merge scenarios ──

#[test]
fn scenario_trusted_directory_untrusted_name() {
    let merged = merge(chain(vec![
        Fragment::trusted("/etc/").file(),
        Fragment::untrusted("passwd").file(),
    ]))
    .unwrap();
    assert_eq!(merged.text, "/etc/passwd");
    assert_eq!(merged.sandbox_prefix.as_deref(), Some("/etc/"));
    assert!(!merged.is_glob);
}

#[test]
fn scenario_escaped_literal_in_glob() {
    let merged = merge(chain(vec![
        Fragment::trusted("a*b").escape_glob(),
        Fragment::trusted("*").glob(),
    ]))
    .unwrap();
    assert!(merged.is_glob);
    assert_eq!(merged.text, "a\\*b*");
}

#[test]
fn scenario_scan_freezes() {
    let merged = merge(chain(vec![
        Fragment::trusted("/tmp/").file(),
        Fragment::untrusted("x/").file(),
        Fragment::trusted("y").file(),
    ]))
    .unwrap();
    assert_eq!(merged.sandbox_prefix.as_deref(), Some("/tmp/"));
}

#[test]
fn scenario_glob_redirect_rejected() {
    let err = redirect::create(
        &FragmentMerger::default(),
        Stream::Stdout,
        TargetKind::File,
        false,
        Some(chain(vec![
            Fragment::trusted("/var/out/").file(),
            Fragment::trusted("*.log").file().glob(),
        ])),
    )
    .unwrap_err();
    assert!(matches!(err, BuildError::UnsupportedGlobRedirect { .. }));
}

#[test]
fn scenario_pipe_appends_in_order() {
    let merger = FragmentMerger::default();
    let existing = redirect::create(
        &merger,
        Stream::Stderr,
        TargetKind::File,
        false,
        Some(chain(vec![Fragment::trusted("/dev/null").file()])),
    )
    .unwrap();

    let mut a: CommandTask = create_command(
        &merger,
        vec![chain(vec![Fragment::trusted("make")])],
        existing.clone().into(),
    )
    .unwrap();
    let mut b: CommandTask = create_command(
        &merger,
        vec![chain(vec![Fragment::trusted("tee")])],
        Default::default(),
    )
    .unwrap();

    redirect::pipe(&mut a, &mut b);

    assert_eq!(
        a.redirects().iter().cloned().collect::<Vec<_>>(),
        vec![existing, Redirect::pipe(Stream::Stdout)]
    );
    assert_eq!(
        b.redirects().iter().cloned().collect::<Vec<_>>(),
        vec![Redirect::pipe(Stream::Stdin)]
    );
}

// ── Templates: plain arguments ──

argv_test!(literal_only, "ls -la /tmp", [], ["ls", "-la", "/tmp"]);
argv_test!(text_value, "echo %s", ["hello world"], ["echo", "hello world"]);
argv_test!(value_mid_word, "--name=%s", ["x y"], ["--name=x y"]);
argv_test!(integer_value, "head -n %d", [20i64], ["head", "-n", "20"]);
argv_test!(percent_literal, "date +%%s", [], ["date", "+%s"]);
argv_test!(escaped_space, "ls my\\ dir", [], ["ls", "my dir"]);
argv_test!(
    metachar_value_without_glob,
    "grep %s",
    ["a*b?"],
    ["grep", "a*b?"]
);

// ── Templates: glob escaping ──

argv_test!(glob_value_escaped, "ls *.%s", ["r*s"], ["ls", "*.r\\*s"]);
argv_test!(
    glob_brackets_escaped,
    "ls /logs/%p*",
    ["app[1]"],
    ["ls", "/logs/app\\[1\\]*"]
);
argv_test!(
    glob_path_passes_through,
    "rm /tmp/%*p",
    ["*.o"],
    ["rm", "/tmp/*.o"]
);
argv_test!(
    backslash_value_cannot_cancel_escape,
    "ls /logs/%p*",
    ["\\*"],
    ["ls", "/logs/\\\\\\**"]
);
argv_test!(
    escaped_backslash_inside_glob,
    "ls a\\\\*",
    [],
    ["ls", "a\\\\*"]
);
argv_test!(
    escaped_literal_inside_glob,
    "ls a\\?*",
    [],
    ["ls", "a\\?*"]
);

#[test]
fn glob_flag_only_on_glob_arguments() {
    let tasks = argforge::assemble("cp *.%s %p", &["txt".into(), "dst".into()]).unwrap();
    let flags: Vec<bool> = tasks[0].arguments().iter().map(|a| a.is_glob).collect();
    assert_eq!(flags, vec![false, true, false]);
}

// ── Templates: sandbox prefixes ──

#[test]
fn path_value_gets_prefix() {
    assert_eq!(
        prefix_for("cat /etc/%p", &["passwd".into()], 1).as_deref(),
        Some("/etc/")
    );
}

#[test]
fn text_value_has_no_prefix() {
    assert_eq!(prefix_for("cat /etc/%s", &["passwd".into()], 1), None);
}

#[test]
fn trusted_path_has_no_prefix() {
    assert_eq!(prefix_for("cat /etc/hosts", &[], 1), None);
}

#[test]
fn bare_path_value_has_empty_prefix() {
    assert_eq!(
        prefix_for("cat %p", &["/etc/shadow".into()], 1).as_deref(),
        Some("")
    );
}

#[test]
fn prefix_stops_at_value_with_separators() {
    assert_eq!(
        prefix_for("cp /srv/%p/data/ x", &["a/b".into()], 1).as_deref(),
        Some("/srv/")
    );
}

#[test]
fn glob_path_prefix() {
    let tasks = argforge::assemble("ls /data/%*p", &["*.csv".into()]).unwrap();
    let arg = &tasks[0].arguments()[1];
    assert!(arg.is_glob);
    assert_eq!(arg.sandbox_prefix.as_deref(), Some("/data/"));
    assert!(arg.check_expansion("/data/a.csv", '/').is_ok());
    assert!(arg.check_expansion("/etc/a.csv", '/').is_err());
}

#[test]
fn traversal_value_caught_by_check() {
    let tasks = argforge::assemble("cat /etc/%p", &["../shadow".into()]).unwrap();
    assert_eq!(
        tasks[0].check_sandbox('/'),
        Err(SandboxViolation::Traversal {
            path: "/etc/../shadow".into()
        })
    );
}

#[test]
fn wildcard_directory_keeps_prefix_before_it() {
    let tasks = argforge::assemble("ls /data/*/%p", &["x".into()]).unwrap();
    let arg = &tasks[0].arguments()[1];
    assert_eq!(arg.text, "/data/*/x");
    assert_eq!(arg.sandbox_prefix.as_deref(), Some("/data/"));
    assert!(arg.check_expansion("/data/a/x", '/').is_ok());
    assert!(arg.check_expansion("/data/../x", '/').is_err());
}

#[test]
fn custom_separator_traversal_caught_by_check() {
    let merger = FragmentMerger::new(MergeOptions::new("?*[]", ':').unwrap());
    let tasks =
        argforge::assemble_with(&merger, "cat srv:%p", &["..:..:etc".into()]).unwrap();
    assert_eq!(tasks[0].arguments()[1].sandbox_prefix.as_deref(), Some("srv:"));
    assert!(matches!(
        tasks[0].check_sandbox(':'),
        Err(SandboxViolation::Traversal { .. })
    ));
}

// ── Templates: redirects and pipes ──

#[test]
fn stdout_to_untrusted_file() {
    let tasks = argforge::assemble("cmd > %p", &["out".into()]).unwrap();
    let redirects: Vec<&Redirect> = tasks[0].redirects().iter().collect();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].stream, Stream::Stdout);
    assert_eq!(
        redirects[0].target,
        Target::File {
            text: "out".into(),
            sandbox_prefix: Some(String::new()),
            append: false,
        }
    );
    assert_eq!(tasks[0].argv(), vec!["cmd"]);
}

#[test]
fn append_redirect_with_prefix() {
    let tasks = argforge::assemble("cmd 2>> /var/log/%p", &["job.log".into()]).unwrap();
    let redirect = tasks[0].redirects().iter().next().unwrap();
    assert_eq!(redirect.stream, Stream::Stderr);
    assert!(redirect.append());
    assert_eq!(redirect.sandbox_prefix(), Some("/var/log/"));
}

#[test]
fn glob_redirect_template_rejected() {
    let err = argforge::assemble("cmd > /tmp/*", &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::Build(BuildError::UnsupportedGlobRedirect { .. })
    ));
}

#[test]
fn value_glob_in_redirect_is_escaped_not_rejected() {
    let tasks = argforge::assemble("cmd > /tmp/%p", &["*".into()]).unwrap();
    let redirect = tasks[0].redirects().iter().next().unwrap();
    assert_eq!(redirect.file_text(), Some("/tmp/*"));
}

#[test]
fn three_stage_pipe() {
    let tasks = argforge::assemble("a | b | c", &[]).unwrap();
    assert_eq!(tasks.len(), 3);
    let middle: Vec<&Redirect> = tasks[1].redirects().iter().collect();
    assert_eq!(
        middle,
        vec![
            &Redirect::pipe(Stream::Stdin),
            &Redirect::pipe(Stream::Stdout)
        ]
    );
}

#[test]
fn both_streams_to_file_then_pipe() {
    let tasks = argforge::assemble("build &> log | cat", &[]).unwrap();
    let streams: Vec<(Stream, bool)> = tasks[0]
        .redirects()
        .iter()
        .map(|r| (r.stream, matches!(r.target, Target::Pipe)))
        .collect();
    assert_eq!(
        streams,
        vec![
            (Stream::Stdout, false),
            (Stream::Stderr, false),
            (Stream::Stdout, true)
        ]
    );
}

// ── Errors ──

#[test]
fn template_errors_surface() {
    assert!(matches!(
        argforge::assemble("cat %p", &[]),
        Err(Error::Template(TemplateError::MissingValue { .. }))
    ));
    assert!(matches!(
        argforge::assemble("cat | ", &[]),
        Err(Error::Template(TemplateError::EmptyCommand { .. }))
    ));
}

#[test]
fn custom_task_receives_arguments() {
    #[derive(Default)]
    struct Recorder {
        args: Vec<String>,
        redirect_batches: usize,
    }
    impl Task for Recorder {
        fn create() -> Self {
            Self::default()
        }
        fn add_argument(&mut self, argument: argforge::MergedArgument) {
            self.args.push(argument.text);
        }
        fn add_redirects(&mut self, _redirects: redirect::RedirectChain) {
            self.redirect_batches += 1;
        }
    }

    let parsed = argforge::parse::parse("echo %s", &["hi".into()]).unwrap();
    let tasks: Vec<Recorder> =
        argforge::assemble::build_pipeline(&FragmentMerger::default(), parsed).unwrap();
    assert_eq!(tasks[0].args, vec!["echo", "hi"]);
    assert_eq!(tasks[0].redirect_batches, 1);
}

use rand::prelude::Distribution;
use rand::Rng;
use std::io::Write;
use std::process::Command;
use std::process::Stdio;
use texpand::vm;
use texpand_stdlib::script;
use texpand_stdlib::StdLibState;

/// Returns a VM with the standard library and an `\end` command that is a no-op,
///     so that documents written for pdfTeX also run in Texpand.
pub fn new_vm() -> Box<vm::VM<StdLibState>> {
    let mut built_ins = StdLibState::all_initial_built_ins();
    built_ins.insert("end", script::get_newline());
    vm::VM::new(built_ins)
}

pub fn run_in_texpand(input: &str) {
    let mut vm = new_vm();
    vm.push_source("".to_string(), input.to_string()).unwrap();
    script::run(&mut vm).unwrap();
}

pub fn host_has_pdftex() -> bool {
    Command::new("which")
        .arg("pdftex")
        .stdout(Stdio::null())
        .spawn()
        .expect("`which pdftex` command failed to start")
        .wait()
        .expect("failed to run `which pdftex`")
        .success()
}

pub fn run_in_pdftex(input: &str) {
    let mut child = Command::new("pdftex")
        .arg("-ini")
        .arg("-etex")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .spawn()
        .expect("pdftex command failed to start");
    let child_stdin = child.stdin.as_mut().unwrap();
    child_stdin
        .write_all(input.as_bytes())
        .expect("failed to write to pdfTeX");
    child.wait().expect("Failed to run pdfTeX");
}

static RANDOM_CS_NAMES: [&str; 16] = [
    "def", "gdef", "edef", "let", "ifcase", "ifnum", "iftrue", "iffalse", "unless", "else", "or",
    "fi", "advance", "count", "expandafter", "end",
];

pub struct Weights {
    pub begin_group: u32,
    pub end_group: u32,
    pub parameter: u32,
    pub space: u32,
    pub comment: u32,
    pub letter: u32,
    pub other: u32,
    pub control_sequence: u32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            begin_group: 10,
            end_group: 10,
            parameter: 20,
            space: 20,
            comment: 5,
            letter: 200,
            other: 100,
            control_sequence: 100,
        }
    }
}

/// Generates a document that defines one large macro and is otherwise a no-op.
///
/// Running it mostly exercises the lexer.
pub fn generate_random_tex_document(
    rng: &mut rand::prelude::StdRng,
    num_lines: usize,
    macro_length_bounds: (usize, usize),
    line_length_bounds: (usize, usize),
    weights: &Weights,
) -> String {
    let mut result = String::new();
    result.push_str("% This TeX document was randomly generated by the Texpand performance crate.\n");
    result.push_str(
        "% Running the document is a no-op except that \\macro will be defined at the end.\n",
    );

    // 2 lines of comments and the final \end are always included
    let mut num_lines_generated: usize = 3;
    loop {
        let (low, high) = if macro_length_bounds.1 < macro_length_bounds.0 {
            (macro_length_bounds.1, macro_length_bounds.1)
        } else {
            macro_length_bounds
        };
        if num_lines_generated + low + 2 >= num_lines {
            break;
        }
        let high = high.min(num_lines - num_lines_generated - 2);
        let macro_length = rng.gen_range(low..=high);
        result.push_str(&generate_random_tex_macro(
            rng,
            line_length_bounds,
            macro_length,
            weights,
        ));
        num_lines_generated += macro_length + 2;
    }
    result.push_str("\\end\n");
    result
}

pub fn generate_random_tex_macro(
    rng: &mut rand::prelude::StdRng,
    line_length_bounds: (usize, usize),
    num_lines: usize,
    weights: &Weights,
) -> String {
    let dist = rand::distributions::WeightedIndex::new([
        weights.begin_group,
        weights.end_group,
        weights.parameter,
        weights.space,
        weights.comment,
        weights.letter,
        weights.other,
        weights.control_sequence,
    ])
    .unwrap();

    let mut result = String::with_capacity(num_lines * line_length_bounds.1 + 100);
    result.push_str("\\def\\macro#1#2#3{\n");
    for _ in 0..num_lines {
        result.push_str("  ");
        let mut commenting = false;
        let mut group_depth: u32 = 0;
        let line_length = if line_length_bounds.1 <= line_length_bounds.0 {
            line_length_bounds.1
        } else {
            rng.gen_range(line_length_bounds.0..=line_length_bounds.1)
        };
        let mut i = 0;
        while i < line_length {
            let temp;
            let s = match dist.sample(rng) {
                0 => {
                    if !commenting {
                        group_depth += 1;
                    }
                    "{"
                }
                1 => {
                    if !commenting && group_depth == 0 {
                        continue;
                    }
                    if !commenting {
                        group_depth -= 1;
                    }
                    "}"
                }
                2 => match rng.gen_range(0..4) {
                    0 => "#1",
                    1 => "#2",
                    2 => "#3",
                    _ => "##",
                },
                3 => " ",
                4 => {
                    for _ in 0..group_depth {
                        result.push('}');
                    }
                    group_depth = 0;
                    commenting = true;
                    "%"
                }
                5 => {
                    let ascii_offset = match rng.gen_range(0..4) {
                        0 => b'A',
                        _ => b'a',
                    };
                    temp = char::from(ascii_offset + rng.gen_range(0..26)).to_string();
                    &temp
                }
                6 => [".", ",", ";", ":", "0", "1", "7", "9"][rng.gen_range(0..8)],
                _ => {
                    temp = format![
                        "\\{} ",
                        RANDOM_CS_NAMES[rng.gen_range(0..RANDOM_CS_NAMES.len())]
                    ];
                    &temp
                }
            };
            i += s.len();
            result.push_str(s);
        }
        for _ in 0..group_depth {
            result.push('}');
        }
        result.push('\n');
    }
    result.push_str("}\n");
    result
}

/// Generates a document made of `num_blocks` randomly nested conditionals.
///
/// Every conditional is well formed, so the document ends with an empty conditional stack.
/// The leaves advance `\count 1`, which later conditionals test,
///     so the branches taken depend on the branches taken before.
pub fn generate_random_conditional_document(
    rng: &mut rand::prelude::StdRng,
    num_blocks: usize,
    max_depth: usize,
) -> String {
    let mut result = String::new();
    result.push_str("\\count 1 = 0 \\def\\step{\\advance\\count 1 by 1 }\n");
    for _ in 0..num_blocks {
        generate_random_conditional(rng, max_depth, &mut result);
        result.push('\n');
    }
    result.push_str("\\end\n");
    result
}

fn generate_random_conditional(rng: &mut rand::prelude::StdRng, depth: usize, result: &mut String) {
    if depth == 0 {
        result.push_str(["\\step x", "y", "\\step\\step z"][rng.gen_range(0..3)]);
        return;
    }
    let is_case = match rng.gen_range(0..7) {
        0 => {
            result.push_str("\\iftrue ");
            false
        }
        1 => {
            result.push_str("\\iffalse ");
            false
        }
        2 => {
            result.push_str("\\unless\\iftrue ");
            false
        }
        3 => {
            result.push_str("\\unless\\iffalse ");
            false
        }
        4 => {
            result.push_str(&format!["\\ifnum\\count 1<{} ", rng.gen_range(0..200)]);
            false
        }
        5 => {
            result.push_str("\\unless\\ifodd\\count 1 ");
            false
        }
        _ => {
            result.push_str(&format!["\\ifcase {} ", rng.gen_range(0..5)]);
            true
        }
    };
    generate_random_conditional(rng, depth - 1, result);
    if is_case {
        for _ in 0..rng.gen_range(0..4) {
            result.push_str("\\or ");
            generate_random_conditional(rng, depth - 1, result);
        }
    }
    if rng.gen_bool(0.5) {
        result.push_str("\\else ");
        generate_random_conditional(rng, depth - 1, result);
    }
    result.push_str("\\fi ");
}

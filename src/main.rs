// MIT License
//
// Copyright (c) 2019 Alasdair Armstrong
//
// Permission is hereby granted, free of charge, to any person
// obtaining a copy of this software and associated documentation
// files (the "Software"), to deal in the Software without
// restriction, including without limitation the rights to use, copy,
// modify, merge, publish, distribute, sublicense, and/or sell copies
// of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS
// BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN
// ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Records the fib benchmark (two threads racing on a pair of counters,
//! adapted from the SV-COMP pthread suite) and emits the SMT-LIB2 script
//! deciding whether the interleaved sums can break the Fibonacci bound.
//! Exit code 0 means the backend reported unsat (no violation reachable),
//! 1 means sat, 2 means the verdict is unknown.

use getopts::Options;
use log::info;
use std::env;
use std::fs::File;
use std::io::Write;
use std::process::exit;

use weft_lib::{Encoder, Error, Script, SmtResult, Threads, Var};

fn print_usage(opts: Options, code: i32) -> ! {
    let brief = "Usage: weft [options]";
    print!("{}", opts.usage(brief));
    exit(code)
}

fn write_script(path: &str, script: &Script) -> Result<(), Error> {
    let mut file = File::create(path)?;
    file.write_all(script.to_smtlib().as_bytes())?;
    Ok(())
}

fn record_fib(unwind: usize, encoder: &mut Encoder<Script>) -> Result<(), Error> {
    Threads::reset();
    Threads::begin_main_thread();

    let i = Var::<i32>::with_value(1);
    let j = Var::<i32>::with_value(1);

    Threads::begin_thread();
    for _ in 0..unwind {
        i.assign(i.read() + j.read());
    }
    Threads::end_thread(encoder)?;

    Threads::begin_thread();
    for _ in 0..unwind {
        j.assign(j.read() + i.read());
    }
    Threads::end_thread(encoder)?;

    Threads::error(i.read().gt(377) | j.read().gt(377), encoder);
    Threads::end_main_thread(encoder)?;

    Ok(())
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut opts = Options::new();
    opts.optopt("k", "unwind", "unwind each loop this many times", "N");
    opts.optopt("o", "output", "write the SMT-LIB2 script to this file", "FILE");
    opts.optflag("s", "simplify", "drop unused definitions from the script");
    opts.optflag("h", "help", "print this help message");
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            println!("{}", f);
            print_usage(opts, 1)
        }
    };
    if matches.opt_present("h") {
        print_usage(opts, 0)
    }

    let unwind = match matches.opt_get_default("k", 6) {
        Ok(k) => k,
        Err(f) => {
            println!("Could not parse --unwind option: {}", f);
            print_usage(opts, 1)
        }
    };

    let mut encoder = Encoder::new(Script::new());
    if let Err(err) = record_fib(unwind, &mut encoder) {
        eprintln!("Recording failed: {}", err);
        exit(2)
    }

    let verdict = match encoder.check() {
        Ok(verdict) => verdict,
        Err(err) => {
            eprintln!("Encoding failed: {}", err);
            exit(2)
        }
    };
    info!("backend verdict: {}", verdict);

    let script = encoder.into_solver();
    let script = if matches.opt_present("s") { script.simplified() } else { script };
    match matches.opt_str("o") {
        Some(path) => {
            if let Err(err) = write_script(&path, &script) {
                eprintln!("Could not write {}: {}", path, err);
                exit(2)
            }
        }
        None => print!("{}", script.to_smtlib()),
    }

    match verdict {
        SmtResult::Unsat => exit(0),
        SmtResult::Sat => exit(1),
        SmtResult::Unknown => {
            eprintln!("Verdict unknown: solve the emitted script with an external backend");
            exit(2)
        }
    }
}

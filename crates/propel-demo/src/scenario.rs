#![forbid(unsafe_code)]

//! Scripted walkthroughs over the profile view-model.
//!
//! Each scenario returns the transcript it produced so the CLI can print it
//! and tests can assert on it.

use std::cell::RefCell;
use std::rc::Rc;

use futures::executor::block_on;
use propel_core::{Observer, Source};
use propel_runtime::{AnyChanged, ObjectConfig, PropertyPath, Reactive};
use tracing::info;

use crate::error::Result;
use crate::model::{Address, CITY, HOME, Person, ProfileForm, ProfileRepository};

/// Ordered lines written by subscriptions during a scenario.
#[derive(Clone, Default)]
pub struct Transcript {
    lines: Rc<RefCell<Vec<String>>>,
}

impl Transcript {
    pub fn push(&self, line: impl Into<String>) {
        self.lines.borrow_mut().push(line.into());
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines.take()
    }
}

/// Edit a person, move them between homes and report what a
/// `home -> city` observer and the global change stream saw.
pub fn run_form(config: &ObjectConfig, name: &str, cities: &[String]) -> Result<Vec<String>> {
    let transcript = Transcript::default();
    let person = Person::new(config);

    let t = transcript.clone();
    let _changes = person.reactive().changed().subscribe(move |event: &AnyChanged| {
        t.push(format!("changed {}", event.property()));
    });
    let t = transcript.clone();
    let _city = person
        .reactive()
        .observe(&PropertyPath::new(&HOME).to(&CITY))?
        .subscribe(move |city: &String| {
            if city.is_empty() {
                t.push("home city: (none)");
            } else {
                t.push(format!("home city: {city}"));
            }
        });

    person.set_name(name);
    person.set_email(format!("{}@example.org", name.to_lowercase()));
    transcript.push(format!("display: {}", person.display()));

    let homes: Vec<Rc<Address>> = cities
        .iter()
        .map(|city| Address::new(config, city.as_str()))
        .collect();
    for home in &homes {
        person.set_home(Some(home));
    }
    if let Some(last) = homes.last() {
        last.set_city(format!("{} (renamed)", last.city()));
    }
    person.set_home(None);
    info!(homes = homes.len(), "demo.form.done");

    person.reactive().dispose();
    Ok(transcript.into_lines())
}

/// Drive the save command: rejected without a name, then failing
/// `failures` times against the backend, then succeeding.
pub fn run_save(config: &ObjectConfig, name: &str, failures: u32) -> Result<(Vec<String>, usize)> {
    let transcript = Transcript::default();
    let repository = ProfileRepository::failing(failures);
    let form = ProfileForm::new(config, Rc::clone(&repository));

    let t = transcript.clone();
    let _enabled = form
        .save
        .can_execute()
        .subscribe(move |enabled: &bool| t.push(format!("save enabled: {enabled}")));
    let t = transcript.clone();
    let _executing = form
        .save
        .is_executing()
        .subscribe(move |busy: &bool| t.push(format!("saving: {busy}")));
    let t = transcript.clone();
    let _errors = form.save.output().subscribe_with(
        Observer::new(|_: &bool| {}).on_error(move |err| t.push(format!("save failed: {err}"))),
    );

    let saved = block_on(form.save.invoke(()));
    transcript.push(format!("save without name -> {saved}"));

    form.person.set_name(name);
    for attempt in 1..=failures + 1 {
        let saved = block_on(form.save.invoke(()));
        transcript.push(format!("attempt {attempt} -> {saved}"));
    }

    form.person.reactive().dispose();
    Ok((transcript.into_lines(), repository.saved().len()))
}

pub mod playbasis;

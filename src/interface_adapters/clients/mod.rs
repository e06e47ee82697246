pub mod highscores;
